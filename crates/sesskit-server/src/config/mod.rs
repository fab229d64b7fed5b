//! Configuration loading and resolution.
//!
//! Each setting resolves as: explicit value, then environment variable, then default.

use std::path::PathBuf;
use std::time::Duration;

use sesskit::{FileBackend, DEFAULT_PREFIX};

pub const PREFIX_ENV: &str = "SESSKIT_PREFIX";
pub const SAVE_PATH_ENV: &str = "SESSKIT_SAVE_PATH";
pub const COOKIE_ENV: &str = "SESSKIT_COOKIE";
pub const MAX_LIFETIME_ENV: &str = "SESSKIT_MAX_LIFETIME";

/// Cookie carrying the session id when none is configured.
pub const DEFAULT_COOKIE_NAME: &str = "SESSKIT_ID";

/// Seconds a session may sit idle before it is treated as expired (24 minutes).
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 1440;

/// Resolved settings shared by the HTTP server and the REPL.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub prefix: String,
    pub save_path: PathBuf,
    pub cookie_name: String,
    /// Idle time after which a stored session is discarded.
    pub max_lifetime: Duration,
}

impl SessionConfig {
    pub fn resolve(prefix: Option<&str>, save_path: Option<&str>, cookie_name: Option<&str>) -> Self {
        Self {
            prefix: resolve_prefix(prefix),
            save_path: resolve_save_path(save_path),
            cookie_name: resolve_cookie_name(cookie_name),
            max_lifetime: resolve_max_lifetime(None),
        }
    }

    /// Override the idle lifetime, in seconds.
    pub fn with_max_lifetime(mut self, secs: Option<u64>) -> Self {
        if secs.is_some() {
            self.max_lifetime = resolve_max_lifetime(secs);
        }
        self
    }

    /// File backend in the configured save path that resumes `id` unless it has expired.
    pub fn open_backend(&self, id: Option<&str>) -> FileBackend {
        FileBackend::resume(&self.save_path, id).with_max_lifetime(self.max_lifetime)
    }
}

/// Resolve the key prefix.
pub fn resolve_prefix(explicit: Option<&str>) -> String {
    if let Some(prefix) = explicit {
        return prefix.to_string();
    }

    std::env::var(PREFIX_ENV).unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

/// Resolve the directory session files are saved in.
pub fn resolve_save_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(SAVE_PATH_ENV) {
        return PathBuf::from(env_path);
    }

    resolve_default_save_path()
}

/// Resolve the session cookie name.
pub fn resolve_cookie_name(explicit: Option<&str>) -> String {
    if let Some(name) = explicit {
        return name.to_string();
    }

    std::env::var(COOKIE_ENV).unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string())
}

/// Resolve the session idle lifetime.
pub fn resolve_max_lifetime(explicit_secs: Option<u64>) -> Duration {
    if let Some(secs) = explicit_secs {
        return Duration::from_secs(secs);
    }

    let secs = match std::env::var(MAX_LIFETIME_ENV) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {MAX_LIFETIME_ENV}={raw:?}");
            DEFAULT_MAX_LIFETIME_SECS
        }),
        Err(_) => DEFAULT_MAX_LIFETIME_SECS,
    };
    Duration::from_secs(secs)
}

fn resolve_default_save_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(".sesskit").join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let config = SessionConfig::resolve(Some("shop_"), Some("/tmp/sess"), Some("SID"));
        assert_eq!(config.prefix, "shop_");
        assert_eq!(config.save_path, PathBuf::from("/tmp/sess"));
        assert_eq!(config.cookie_name, "SID");
    }

    #[test]
    fn test_explicit_max_lifetime_wins() {
        let config = SessionConfig::resolve(None, Some("/tmp/sess"), None).with_max_lifetime(Some(60));
        assert_eq!(config.max_lifetime, Duration::from_secs(60));
        assert_eq!(resolve_max_lifetime(Some(5)), Duration::from_secs(5));
    }
}
