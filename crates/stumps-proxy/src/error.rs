//! Error types shared across the proxy runtime.

/// Errors surfaced by administrative operations.
///
/// Request-handling failures never use this type; the pipeline maps them
/// straight to HTTP status codes (400/500/502) before they can escape the
/// listener.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("failed to bind port {0}: {1}")]
    Bind(u16, String),

    #[error("persistence failure")]
    Persistence(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }
}
