//! Error types for parlor-core.

use thiserror::Error;

use crate::name::MAX_NAME_CHARS;

/// Why a requested display name was refused at connection time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("username cannot be empty")]
    Empty,

    #[error("username too long (max {max} characters)", max = MAX_NAME_CHARS)]
    TooLong { len: usize },

    #[error(
        "username contains invalid characters (only letters, numbers, underscore, and hyphen allowed)"
    )]
    InvalidCharacters,
}

/// Why a stamped message was dropped instead of broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("empty content")]
    EmptyContent,

    #[error("content too long ({len} characters)")]
    ContentTooLong { len: usize },

    #[error("invalid type: {0}")]
    InvalidType(String),
}
