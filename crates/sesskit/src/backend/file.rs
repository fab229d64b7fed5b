//! File-backed sessions: one `sess_<id>` file per session in a save directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{is_valid_session_id, new_session_id, SessionBackend};
use crate::storage::{unix_now, SessReader, SessWriter, SessionFile};
use crate::types::{SessionData, SessionError, SessionResult};

const FILE_PREFIX: &str = "sess_";

/// Session persisted to disk. Changes are written by `save` or on drop.
pub struct FileBackend {
    save_dir: PathBuf,
    requested_id: Option<String>,
    id: Option<String>,
    file: SessionFile,
    max_lifetime: Option<Duration>,
    active: bool,
    dirty: bool,
}

impl FileBackend {
    /// Backend for a new session in `save_dir`.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            requested_id: None,
            id: None,
            file: SessionFile::new(SessionData::new()),
            max_lifetime: None,
            active: false,
            dirty: false,
        }
    }

    /// Backend that resumes `id` on start if a file exists for it.
    pub fn resume(save_dir: impl Into<PathBuf>, id: Option<&str>) -> Self {
        let mut backend = Self::new(save_dir);
        backend.requested_id = id.map(str::to_string);
        backend
    }

    /// Treat sessions idle for longer than `max_lifetime` as gone when resuming.
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = Some(max_lifetime);
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Path of the file that holds session `id`.
    pub fn session_path(&self, id: &str) -> PathBuf {
        self.save_dir.join(format!("{FILE_PREFIX}{id}"))
    }

    /// Ids of every session file in the save directory, sorted.
    pub fn stored_ids(&self) -> SessionResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.save_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let id = name.strip_prefix(FILE_PREFIX)?;
                is_valid_session_id(id).then(|| id.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Whether the current session has a file on disk.
    pub fn is_persisted(&self) -> bool {
        self.id
            .as_deref()
            .is_some_and(|id| self.session_path(id).exists())
    }

    /// Delete session files idle for longer than `max_age`, and unreadable ones.
    ///
    /// The current session is never removed. Returns the number of files deleted.
    pub fn gc(&self, max_age: Duration) -> SessionResult<usize> {
        let mut removed = 0;
        for id in self.stored_ids()? {
            if self.id.as_deref() == Some(id.as_str()) {
                continue;
            }
            let stale = match SessReader::read_from_file(&self.session_path(&id)) {
                Ok(file) => is_expired(file.updated_at, max_age),
                Err(e) => {
                    tracing::warn!("Removing unreadable session {id}: {e}");
                    true
                }
            };
            if stale {
                self.remove_file(&id)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!("Session gc removed {removed} files from {}", self.save_dir.display());
        }
        Ok(removed)
    }

    /// Unix seconds when the session was first created.
    pub fn created_at(&self) -> u64 {
        self.file.created_at
    }

    /// Unix seconds of the last write.
    pub fn updated_at(&self) -> u64 {
        self.file.updated_at
    }

    fn load(&self, id: &str) -> Option<SessionFile> {
        if !is_valid_session_id(id) {
            tracing::warn!("Ignoring malformed session id");
            return None;
        }
        let path = self.session_path(id);
        if !path.exists() {
            return None;
        }
        match SessReader::read_from_file(&path) {
            Ok(file) if self.max_lifetime.is_some_and(|max| is_expired(file.updated_at, max)) => {
                tracing::debug!("Session {id} expired");
                if let Err(e) = self.remove_file(id) {
                    tracing::warn!("Failed to remove expired session {id}: {e}");
                }
                None
            }
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Discarding unreadable session file {}: {e}", path.display());
                None
            }
        }
    }

    fn remove_file(&self, id: &str) -> SessionResult<()> {
        match std::fs::remove_file(self.session_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }
}

impl SessionBackend for FileBackend {
    fn start(&mut self) -> SessionResult<()> {
        if self.active {
            return Ok(());
        }

        std::fs::create_dir_all(&self.save_dir).map_err(|e| {
            SessionError::Io(std::io::Error::other(format!(
                "Failed to create save dir {}: {e}",
                self.save_dir.display()
            )))
        })?;

        let resumed = self
            .requested_id
            .take()
            .and_then(|id| self.load(&id).map(|file| (id, file)));

        match resumed {
            Some((id, file)) => {
                tracing::debug!("Resumed session {id} ({} keys)", file.data.len());
                self.file = file;
                self.id = Some(id);
                self.dirty = false;
            }
            None => {
                let id = new_session_id();
                tracing::debug!("Created session {id}");
                self.file = SessionFile::new(SessionData::new());
                self.id = Some(id);
                // written on first mutation
                self.dirty = false;
            }
        }

        self.active = true;
        Ok(())
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn regenerate_id(&mut self) -> SessionResult<String> {
        let old = self.id.clone().ok_or(SessionError::NotStarted)?;
        self.remove_file(&old)?;

        let id = new_session_id();
        tracing::debug!("Regenerated session id {old} -> {id}");
        self.id = Some(id.clone());
        self.dirty = true;
        Ok(id)
    }

    fn data(&self) -> &SessionData {
        &self.file.data
    }

    fn data_mut(&mut self) -> &mut SessionData {
        self.dirty = true;
        &mut self.file.data
    }

    fn unset_all(&mut self) {
        self.file.data.clear();
        self.dirty = true;
    }

    fn destroy(&mut self) -> SessionResult<()> {
        if let Some(id) = self.id.take() {
            self.remove_file(&id)?;
            tracing::debug!("Destroyed session {id}");
        }
        self.file.data.clear();
        self.active = false;
        self.dirty = false;
        Ok(())
    }

    fn save(&mut self) -> SessionResult<()> {
        if !self.dirty || !self.active {
            return Ok(());
        }
        let Some(id) = self.id.as_deref() else {
            return Ok(());
        };

        let path = self.session_path(id);
        self.file.updated_at = unix_now();
        SessWriter::write_to_file(&self.file, &path)?;

        self.dirty = false;
        tracing::debug!("Saved session file: {}", path.display());
        Ok(())
    }
}

fn is_expired(updated_at: u64, max_age: Duration) -> bool {
    unix_now().saturating_sub(updated_at) > max_age.as_secs()
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.save() {
                tracing::error!("Failed to save session on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_session_is_written_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path());
        backend.start().unwrap();
        backend.data_mut().insert("app_a".into(), json!(1));
        backend.save().unwrap();

        let id = backend.id().unwrap().to_string();
        assert!(backend.session_path(&id).exists());
        assert_eq!(backend.stored_ids().unwrap(), vec![id]);
    }

    #[test]
    fn test_untouched_session_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path());
        backend.start().unwrap();
        let _ = backend.data().len();
        backend.save().unwrap();
        drop(backend);
        assert!(FileBackend::new(dir.path()).stored_ids().unwrap().is_empty());
    }

    #[test]
    fn test_resume_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mut backend = FileBackend::new(dir.path());
            backend.start().unwrap();
            backend.data_mut().insert("app_name".into(), json!("ada"));
            backend.id().unwrap().to_string()
            // dropped dirty: saved here
        };

        let mut backend = FileBackend::resume(dir.path(), Some(&id));
        backend.start().unwrap();
        assert_eq!(backend.id(), Some(id.as_str()));
        assert_eq!(backend.data()["app_name"], "ada");
    }

    #[test]
    fn test_unknown_id_gets_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let unknown = new_session_id();
        let mut backend = FileBackend::resume(dir.path(), Some(&unknown));
        backend.start().unwrap();
        assert_ne!(backend.id(), Some(unknown.as_str()));
    }

    #[test]
    fn test_malformed_id_gets_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::resume(dir.path(), Some("../escape"));
        backend.start().unwrap();
        assert!(is_valid_session_id(backend.id().unwrap()));
    }

    #[test]
    fn test_corrupt_file_gets_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let id = new_session_id();
        std::fs::write(dir.path().join(format!("sess_{id}")), b"garbage").unwrap();

        let mut backend = FileBackend::resume(dir.path(), Some(&id));
        backend.start().unwrap();
        assert_ne!(backend.id(), Some(id.as_str()));
    }

    #[test]
    fn test_regenerate_removes_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path());
        backend.start().unwrap();
        backend.data_mut().insert("app_a".into(), json!(1));
        backend.save().unwrap();
        assert!(backend.is_persisted());
        let old = backend.id().unwrap().to_string();

        let new = backend.regenerate_id().unwrap();
        backend.save().unwrap();
        assert!(!backend.session_path(&old).exists());
        assert!(backend.session_path(&new).exists());
    }

    #[test]
    fn test_destroy_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path());
        backend.start().unwrap();
        backend.data_mut().insert("app_a".into(), json!(1));
        backend.save().unwrap();
        let id = backend.id().unwrap().to_string();
        assert!(backend.session_path(&id).exists());

        backend.destroy().unwrap();
        assert!(!backend.session_path(&id).exists());
        assert!(backend.id().is_none());
        drop(backend);
        assert!(FileBackend::new(dir.path()).stored_ids().unwrap().is_empty());
    }

    /// Write a session file for a fresh id whose last update was `age_secs` ago.
    fn write_aged(dir: &Path, age_secs: u64) -> String {
        let id = new_session_id();
        let mut file = SessionFile::new(SessionData::new());
        file.data.insert("app_k".into(), json!(1));
        file.updated_at = unix_now() - age_secs;
        SessWriter::write_to_file(&file, &dir.join(format!("sess_{id}"))).unwrap();
        id
    }

    #[test]
    fn test_gc_removes_stale_and_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let stale = write_aged(dir.path(), 7200);
        let fresh = write_aged(dir.path(), 10);
        let broken = new_session_id();
        std::fs::write(dir.path().join(format!("sess_{broken}")), b"garbage").unwrap();

        let backend = FileBackend::new(dir.path());
        let removed = backend.gc(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(backend.stored_ids().unwrap(), vec![fresh]);
        assert!(!backend.session_path(&stale).exists());
    }

    #[test]
    fn test_gc_keeps_current_session() {
        let dir = tempfile::tempdir().unwrap();
        let id = write_aged(dir.path(), 7200);

        let mut backend = FileBackend::resume(dir.path(), Some(&id));
        backend.start().unwrap();
        assert_eq!(backend.gc(Duration::from_secs(60)).unwrap(), 0);
        assert!(backend.is_persisted());
    }

    #[test]
    fn test_expired_session_is_not_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let id = write_aged(dir.path(), 7200);

        let mut backend =
            FileBackend::resume(dir.path(), Some(&id)).with_max_lifetime(Duration::from_secs(3600));
        backend.start().unwrap();
        assert_ne!(backend.id(), Some(id.as_str()));
        assert!(!backend.session_path(&id).exists());
    }
}
