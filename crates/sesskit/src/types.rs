//! Core data types for session values, flash messages, and errors.

use serde::{Deserialize, Serialize};

/// A value held in the session store.
pub type SessionValue = serde_json::Value;

/// The raw key/value mapping owned by a backend.
pub type SessionData = serde_json::Map<String, SessionValue>;

/// Flash record in the explicit `{type, text}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl FlashMessage {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
        }
    }
}

/// A flash entry as the caller stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flash {
    /// Plain text; the alert type is taken from the entry name.
    Plain(String),
    /// Explicit alert type and text.
    Styled(FlashMessage),
}

impl Flash {
    pub fn plain(text: impl Into<String>) -> Self {
        Flash::Plain(text.into())
    }

    pub fn styled(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Flash::Styled(FlashMessage::new(kind, text))
    }

    pub fn into_value(self) -> SessionValue {
        match self {
            Flash::Plain(text) => SessionValue::String(text),
            Flash::Styled(msg) => serde_json::json!({ "type": msg.kind, "text": msg.text }),
        }
    }
}

/// What a `set` writes, chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Single { key: String, value: SessionValue },
    Bulk(Vec<(String, SessionValue)>),
    Flash { name: String, flash: Flash },
}

impl Assignment {
    pub fn single(key: impl Into<String>, value: impl Into<SessionValue>) -> Self {
        Assignment::Single {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build a bulk assignment from a JSON object. Any other value yields an empty batch.
    pub fn bulk_from_object(value: SessionValue) -> Self {
        match value {
            SessionValue::Object(map) => Assignment::Bulk(map.into_iter().collect()),
            _ => Assignment::Bulk(Vec::new()),
        }
    }
}

/// Errors raised by session backends and the storage codec.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session not started")]
    NotStarted,
}

/// Convenience result type.
pub type SessionResult<T> = Result<T, SessionError>;
