//! sesskit server — HTTP surface and REPL over prefixed, file-backed sessions.

pub mod config;
#[cfg(feature = "http")]
pub mod http;
pub mod maintenance;
pub mod repl;
pub mod types;

pub use config::SessionConfig;
#[cfg(feature = "http")]
pub use http::HttpServer;
