//! Host session facilities the accessor delegates to.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::types::{SessionData, SessionResult};

/// A per-visitor session store with an identity and a lifecycle.
pub trait SessionBackend {
    /// Start (or resume) the session. Calling it on an active session is a no-op.
    fn start(&mut self) -> SessionResult<()>;

    /// The current session id, if a session is active.
    fn id(&self) -> Option<&str>;

    /// Replace the session id, invalidating the old one. Returns the new id.
    fn regenerate_id(&mut self) -> SessionResult<String>;

    fn data(&self) -> &SessionData;

    fn data_mut(&mut self) -> &mut SessionData;

    /// Remove every key while keeping the session itself.
    fn unset_all(&mut self);

    /// Tear down the session: data, id, and anything persisted.
    fn destroy(&mut self) -> SessionResult<()>;

    /// Flush pending changes. Backends without persistence have nothing to do.
    fn save(&mut self) -> SessionResult<()> {
        Ok(())
    }
}

/// Generate a fresh session id (32 lowercase hex chars).
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Whether `id` has the shape of an id produced by [`new_session_id`].
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(is_valid_session_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../../etc/passwd"));
        assert!(!is_valid_session_id(&"A".repeat(32)));
        assert!(!is_valid_session_id(&"a".repeat(31)));
    }
}
