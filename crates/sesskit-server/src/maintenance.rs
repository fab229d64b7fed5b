//! Background removal of expired session files.

use std::time::Duration;

use sesskit::{FileBackend, SessionResult};

use crate::config::SessionConfig;

/// Remove every session in the configured save path idle longer than its max lifetime.
pub fn sweep(config: &SessionConfig) -> SessionResult<usize> {
    FileBackend::new(&config.save_path).gc(config.max_lifetime)
}

/// Sweep the save path every `every` until the task is aborted.
pub fn spawn(config: SessionConfig, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "session gc started: every={}s max_lifetime={}s",
            every.as_secs(),
            config.max_lifetime.as_secs()
        );
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let cfg = config.clone();
            match tokio::task::spawn_blocking(move || sweep(&cfg)).await {
                Ok(Ok(removed)) => tracing::debug!("session gc tick removed {removed}"),
                Ok(Err(e)) => tracing::warn!("session gc failed: {e}"),
                Err(e) => tracing::error!("session gc task failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sesskit::{Session, SessionBackend};

    #[test]
    fn test_sweep_respects_max_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::resolve(Some("t_"), dir.path().to_str(), None);

        let mut session = Session::start(config.open_backend(None), "t_");
        session.set("k", 1);
        session.save().unwrap();
        let id = session.id().unwrap().to_string();
        drop(session);

        assert_eq!(sweep(&config).unwrap(), 0);
        assert!(config.open_backend(None).session_path(&id).exists());

        let expired = config.with_max_lifetime(Some(0));
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(sweep(&expired).unwrap(), 1);
        assert!(FileBackend::new(&expired.save_path).stored_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_removes_expired() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::resolve(Some("t_"), dir.path().to_str(), None)
            .with_max_lifetime(Some(0));

        let mut backend = config.open_backend(None);
        backend.start().unwrap();
        backend.data_mut().insert("t_k".into(), serde_json::json!(1));
        backend.save().unwrap();
        drop(backend);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let task = spawn(config.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();
        assert!(FileBackend::new(&config.save_path).stored_ids().unwrap().is_empty());
    }
}
