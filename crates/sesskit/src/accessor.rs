//! Prefixed accessor over a session backend.

use crate::backend::SessionBackend;
use crate::flash::{self, DEFAULT_FLASH};
use crate::types::{Assignment, Flash, SessionData, SessionResult, SessionValue};

/// Namespaced view of one visitor's session.
///
/// Every key passed to the accessor is stored as `prefix + key`, so several
/// concerns can share one backend without colliding.
pub struct Session<B: SessionBackend> {
    backend: B,
    prefix: String,
    started: bool,
}

impl<B: SessionBackend> Session<B> {
    /// Wrap `backend`. The session is not started until [`initialize`](Self::initialize).
    pub fn new(backend: B, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            started: false,
        }
    }

    /// Wrap `backend` and start it.
    pub fn start(backend: B, prefix: impl Into<String>) -> Self {
        let mut session = Self::new(backend, prefix);
        session.initialize();
        session
    }

    /// Start the backend session once. Later calls do nothing.
    ///
    /// A start failure is logged and leaves the session unstarted.
    pub fn initialize(&mut self) {
        if self.started {
            return;
        }
        match self.backend.start() {
            Ok(()) => self.started = true,
            Err(e) => tracing::warn!("Failed to start session: {e}"),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Whether `key` holds a non-null value.
    pub fn exists(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn set(&mut self, key: &str, value: impl Into<SessionValue>) {
        let full = self.full_key(key);
        self.backend.data_mut().insert(full, value.into());
    }

    /// Store every `(name, value)` pair under its own prefixed name.
    pub fn set_many<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SessionValue>,
    {
        for (name, value) in entries {
            self.set(name.as_ref(), value);
        }
    }

    /// Store a flash entry for [`message`](Self::message) to consume.
    pub fn flash(&mut self, name: &str, flash: Flash) {
        self.set(name, flash.into_value());
    }

    /// Apply a caller-chosen assignment.
    pub fn apply(&mut self, assignment: Assignment) {
        match assignment {
            Assignment::Single { key, value } => self.set(&key, value),
            Assignment::Bulk(entries) => self.set_many(entries),
            Assignment::Flash { name, flash } => self.flash(&name, flash),
        }
    }

    /// Read `key`, or the entry `second_key` inside it.
    ///
    /// An empty or `"0"` second key is ignored. Nested arrays are indexed by
    /// the numeric value of `second_key`.
    pub fn get(&self, key: &str, second_key: Option<&str>) -> Option<&SessionValue> {
        let value = self.lookup(key)?;
        match second_key.filter(|k| !k.is_empty() && *k != "0") {
            None => Some(value),
            Some(inner) => {
                let nested = match value {
                    SessionValue::Object(map) => map.get(inner),
                    SessionValue::Array(items) => {
                        inner.parse::<usize>().ok().and_then(|i| items.get(i))
                    }
                    _ => None,
                };
                nested.filter(|v| !v.is_null())
            }
        }
    }

    /// Remove `key` and return what it held.
    pub fn pull(&mut self, key: &str) -> Option<SessionValue> {
        let full = self.full_key(key);
        if !self.backend.data().contains_key(&full) {
            return None;
        }
        self.backend
            .data_mut()
            .remove(&full)
            .filter(|v| !v.is_null())
    }

    /// Id of the running session.
    pub fn id(&self) -> Option<&str> {
        self.backend.id()
    }

    /// Rotate the session id and return the new one.
    pub fn regenerate(&mut self) -> SessionResult<String> {
        let id = self.backend.regenerate_id()?;
        tracing::info!("Session id regenerated");
        Ok(id)
    }

    /// The whole store, including keys outside the prefix.
    pub fn display(&self) -> &SessionData {
        self.backend.data()
    }

    /// Remove session data. Does nothing before the session is initialized.
    ///
    /// An empty `key` without `clear_prefix` tears down the whole session.
    /// Otherwise `clear_prefix` removes every prefixed key, and failing that
    /// only `key` is removed.
    pub fn destroy(&mut self, key: &str, clear_prefix: bool) -> SessionResult<()> {
        if !self.started {
            return Ok(());
        }

        if key.is_empty() && !clear_prefix {
            self.backend.unset_all();
            self.backend.destroy()?;
            self.started = false;
            tracing::info!("Session destroyed");
        } else if clear_prefix {
            let prefix = &self.prefix;
            if !self.backend.data().keys().any(|k| k.starts_with(prefix.as_str())) {
                return Ok(());
            }
            let data = self.backend.data_mut();
            let before = data.len();
            data.retain(|k, _| !k.starts_with(prefix.as_str()));
            tracing::debug!("Cleared {} keys under prefix '{prefix}'", before - data.len());
        } else {
            let full = self.full_key(key);
            if self.backend.data().contains_key(&full) {
                self.backend.data_mut().remove(&full);
            }
        }
        Ok(())
    }

    /// Tear down the whole session.
    pub fn destroy_session(&mut self) -> SessionResult<()> {
        self.destroy("", false)
    }

    /// Remove every key under this accessor's prefix.
    pub fn clear_prefixed(&mut self) -> SessionResult<()> {
        self.destroy("", true)
    }

    /// Remove a single key.
    pub fn forget(&mut self, key: &str) -> SessionResult<()> {
        if key.is_empty() {
            return Ok(());
        }
        self.destroy(key, false)
    }

    /// Consume the flash entry `name` and render it, or `None` if there is none.
    pub fn message(&mut self, name: &str) -> Option<String> {
        let value = self.pull(name)?;
        let msg = flash::decode(name, &value)?;
        Some(flash::render(&msg.kind, &msg.text))
    }

    /// [`message`](Self::message) for the default `"success"` entry.
    pub fn message_default(&mut self) -> Option<String> {
        self.message(DEFAULT_FLASH)
    }

    /// Flush the backend.
    pub fn save(&mut self) -> SessionResult<()> {
        self.backend.save()
    }

    fn lookup(&self, key: &str) -> Option<&SessionValue> {
        self.backend
            .data()
            .get(&self.full_key(key))
            .filter(|v| !v.is_null())
    }
}
