//! Error taxonomy for CVS client sessions.
//!
//! Every failure a session can produce unwinds to
//! [`RequestProcessor::process_requests`](crate::session::RequestProcessor::process_requests)
//! as one of these variants, after the connection streams have been closed.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CvsError {
    /// Opening the connection failed (authentication, connect, spawn).
    #[error("could not establish connection: {0}")]
    Authentication(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server never answered the `valid-requests` handshake.
    #[error("valid requests expected")]
    ValidRequestsExpected,

    /// A response could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Cooperative cancellation was observed.
    #[error("command aborted")]
    Aborted,

    /// The error circuit breaker tripped during response dispatch.
    #[error("session interrupted after {errors} consecutive error responses")]
    Interrupted { errors: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CvsError {
    pub fn protocol(message: impl Into<String>) -> Self {
        CvsError::Protocol(message.into())
    }

    /// True for errors that came from the byte channel rather than from
    /// protocol or policy decisions.
    pub fn is_io(&self) -> bool {
        matches!(self, CvsError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, CvsError>;
