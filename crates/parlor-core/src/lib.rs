//! # parlor-core
//!
//! Core types for the Parlor chat relay:
//! - The chat message model and its JSON wire frame
//! - Stamping of inbound frames with the relay's identity and clock
//! - The message validator
//! - Display name validation and synthetic name assignment
//!
//! This crate has no network code. The relay crate builds on it.

pub mod error;
pub mod message;
pub mod name;
pub mod validate;

pub use error::{NameError, Rejection};
pub use message::{Candidate, ChatMessage, InboundFrame, MessageKind, SERVER_NAME};
pub use name::DisplayName;
