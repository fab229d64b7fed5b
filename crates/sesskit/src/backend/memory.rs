//! In-process session backend.

use super::{new_session_id, SessionBackend};
use crate::types::{SessionData, SessionError, SessionResult};

/// Session held entirely in memory. Nothing survives the value.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    requested_id: Option<String>,
    id: Option<String>,
    data: SessionData,
    active: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `id` instead of a generated one when the session starts.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            requested_id: Some(id.into()),
            ..Self::default()
        }
    }
}

impl SessionBackend for MemoryBackend {
    fn start(&mut self) -> SessionResult<()> {
        if self.active {
            return Ok(());
        }
        let id = self.requested_id.take().unwrap_or_else(new_session_id);
        tracing::debug!("Started in-memory session {id}");
        self.id = Some(id);
        self.active = true;
        Ok(())
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn regenerate_id(&mut self) -> SessionResult<String> {
        if !self.active {
            return Err(SessionError::NotStarted);
        }
        let id = new_session_id();
        self.id = Some(id.clone());
        Ok(id)
    }

    fn data(&self) -> &SessionData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    fn unset_all(&mut self) {
        self.data.clear();
    }

    fn destroy(&mut self) -> SessionResult<()> {
        self.data.clear();
        self.id = None;
        self.active = false;
        Ok(())
    }
}
