//! Server error type and its HTTP status mapping.

/// All errors the server surfaces to clients.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid body: {0}")]
    InvalidBody(String),

    #[error("Session storage unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Session error: {0}")]
    Session(#[from] sesskit::SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::KeyNotFound(_) => 404,
            ServerError::InvalidBody(_) => 400,
            ServerError::SessionUnavailable(_)
            | ServerError::Session(_)
            | ServerError::Io(_)
            | ServerError::Transport(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::KeyNotFound(_) => "key_not_found",
            ServerError::InvalidBody(_) => "invalid_body",
            ServerError::SessionUnavailable(_) => "session_unavailable",
            ServerError::Session(_) => "session_error",
            ServerError::Io(_) => "io_error",
            ServerError::Transport(_) => "transport_error",
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
