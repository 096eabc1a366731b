//! Per-connection lifecycle.
//!
//! `Accepting → Registered → Reading → Closing → Closed`. Each accepted
//! connection runs one [`Session`] on its own task and touches shared state
//! only through the registry and the broadcast queue.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use parlor_core::{ChatMessage, DisplayName, InboundFrame, NameError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::connection::{Closure, ConnectionHandle};
use crate::dispatcher::Outbox;
use crate::error::TransportError;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accepting,
    Registered,
    Reading,
    Closing,
    Closed,
}

impl Phase {
    /// The only phase this one may move to.
    pub fn successor(self) -> Option<Phase> {
        match self {
            Phase::Accepting => Some(Phase::Registered),
            Phase::Registered => Some(Phase::Reading),
            Phase::Reading => Some(Phase::Closing),
            Phase::Closing => Some(Phase::Closed),
            Phase::Closed => None,
        }
    }
}

/// Why the read loop ended.
#[derive(Debug)]
pub enum Disconnect {
    /// The peer sent a close frame.
    PeerClosed,
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// Read error, idle deadline, or a frame that is not a chat frame.
    Failed(TransportError),
}

/// Accept-time name check, run before the transport is upgraded.
pub fn admit(requested: Option<&str>, at: DateTime<Utc>) -> Result<DisplayName, NameError> {
    DisplayName::resolve(requested, at)
}

/// One connection's lifecycle.
pub struct Session {
    handle: Arc<ConnectionHandle>,
    registry: Arc<Registry>,
    outbox: Outbox,
    read_idle_timeout: Duration,
    write_timeout: Duration,
    phase: Phase,
}

impl Session {
    pub fn new(
        handle: Arc<ConnectionHandle>,
        registry: Arc<Registry>,
        outbox: Outbox,
        config: &RelayConfig,
    ) -> Self {
        Self {
            handle,
            registry,
            outbox,
            read_idle_timeout: config.read_idle_timeout,
            write_timeout: config.write_timeout,
            phase: Phase::Accepting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drive the connection from registration to teardown.
    pub async fn run<S>(mut self, mut inbound: S) -> Disconnect
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let name = self.handle.name().clone();

        self.registry.register(Arc::clone(&self.handle)).await;
        self.advance(Phase::Registered);
        info!(conn = %self.handle.id(), "{name} connected");
        self.outbox.enqueue(ChatMessage::joined(&name, Utc::now()));

        self.advance(Phase::Reading);
        let reason = self.read_loop(&mut inbound).await;
        match &reason {
            Disconnect::PeerClosed | Disconnect::StreamEnded => {
                info!(conn = %self.handle.id(), "{name} disconnected gracefully");
            }
            Disconnect::Failed(e) => {
                warn!(conn = %self.handle.id(), "{name} disconnected: {e}");
            }
        }

        self.advance(Phase::Closing);
        if !self.registry.deregister(self.handle.id()).await {
            debug!(conn = %self.handle.id(), "already removed by dispatcher");
        }
        self.outbox.enqueue(ChatMessage::left(&name, Utc::now()));

        self.handle
            .close(Closure::Normal, "goodbye", self.write_timeout)
            .await;
        self.advance(Phase::Closed);
        reason
    }

    /// Read until the peer leaves, fails, goes idle, or the handle is closed
    /// from elsewhere. Only text frames push the idle deadline back.
    async fn read_loop<S>(&self, inbound: &mut S) -> Disconnect
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let idle = tokio::time::sleep(self.read_idle_timeout);
        tokio::pin!(idle);

        loop {
            let frame = tokio::select! {
                biased;
                () = self.handle.closed() => {
                    return Disconnect::Failed(TransportError::Closed);
                }
                () = &mut idle => {
                    return Disconnect::Failed(TransportError::ReadTimeout(self.read_idle_timeout));
                }
                next = inbound.next() => match next {
                    None => return Disconnect::StreamEnded,
                    Some(Err(e)) => return Disconnect::Failed(e.into()),
                    Some(Ok(frame)) => frame,
                },
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => return Disconnect::PeerClosed,
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Binary(_) => {
                    return Disconnect::Failed(TransportError::MalformedFrame(
                        "expected a text frame".into(),
                    ));
                }
            };
            idle.as_mut().reset(Instant::now() + self.read_idle_timeout);

            let frame = match InboundFrame::decode(text.as_str()) {
                Ok(frame) => frame,
                Err(e) => return Disconnect::Failed(TransportError::MalformedFrame(e.to_string())),
            };

            match frame.stamp(self.handle.name(), Utc::now()).into_message() {
                Ok(msg) => self.outbox.enqueue(msg),
                Err(reason) => {
                    debug!(
                        conn = %self.handle.id(),
                        "invalid message from {}: {reason}",
                        self.handle.name()
                    );
                }
            }
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert_eq!(
            self.phase.successor(),
            Some(next),
            "illegal phase transition {:?} -> {next:?}",
            self.phase
        );
        debug!(conn = %self.handle.id(), from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }
}
