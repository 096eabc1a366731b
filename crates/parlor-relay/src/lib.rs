//! Parlor relay: a single-room WebSocket chat relay.
//!
//! Every message a participant sends is stamped with their name and the
//! relay's clock, validated, and fanned out to everyone connected, the
//! sender included. Joins and leaves are announced as system notices.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod server;

pub use config::RelayConfig;
pub use error::{ConfigError, RelayError, TransportError};
pub use server::{Relay, RelayState};
