//! Error types for the relay.

use std::time::Duration;

use thiserror::Error;

/// A failure on one connection's transport. Always ends that connection
/// and never spreads to others.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("write deadline of {0:?} exceeded")]
    WriteTimeout(Duration),

    #[error("no frame received within {0:?}")]
    ReadTimeout(Duration),

    #[error("transport already closed")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Bad configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    ZeroDuration { var: &'static str },
}

/// Startup and serving failures.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
