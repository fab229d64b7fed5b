//! Error and response types for the server.

pub mod error;
pub mod response;

pub use error::*;
pub use response::*;
