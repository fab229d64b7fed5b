//! sesskit — prefixed accessor over per-visitor session stores, with one-time flash messages.

pub mod accessor;
pub mod backend;
pub mod flash;
pub mod storage;
pub mod types;

pub use accessor::Session;
pub use backend::{is_valid_session_id, new_session_id, FileBackend, MemoryBackend, SessionBackend};
pub use flash::DEFAULT_FLASH;
pub use storage::{SessReader, SessWriter, SessionFile};
pub use types::*;

/// Key prefix used when configuration supplies none.
pub const DEFAULT_PREFIX: &str = "sesskit_";
