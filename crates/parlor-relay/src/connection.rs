//! Per-connection handle: one transport write half plus the name bound to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::SinkExt;
use futures::stream::SplitSink;
use parlor_core::DisplayName;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::TransportError;

/// Identity of one accepted connection. Names may repeat; ids never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a transport is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Orderly shutdown after the peer left or went idle.
    Normal,
    /// The relay gave up on the peer (failed or stalled write).
    Abnormal,
}

impl Closure {
    pub fn code(self) -> u16 {
        match self {
            Closure::Normal => close_code::NORMAL,
            Closure::Abnormal => close_code::ERROR,
        }
    }
}

/// The sending side of a message-framed transport.
#[async_trait]
pub trait Outbound: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Send a close signal. Errors are ignored: the transport is going away.
    async fn close(&mut self, closure: Closure, reason: &str);
}

#[async_trait]
impl Outbound for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.send(Message::Text(text.to_owned().into())).await?;
        Ok(())
    }

    async fn close(&mut self, closure: Closure, reason: &str) {
        let frame = CloseFrame {
            code: closure.code(),
            reason: reason.to_owned().into(),
        };
        let _ = self.send(Message::Close(Some(frame))).await;
        let _ = SinkExt::close(self).await;
    }
}

/// A live participant.
///
/// The lifecycle handler owns the handle; the registry keeps a shared
/// reference so the dispatcher can write to it. Closing from either side
/// fires [`ConnectionHandle::closed`], which ends the handler's read loop.
pub struct ConnectionHandle {
    id: ConnectionId,
    name: DisplayName,
    outbound: Mutex<Box<dyn Outbound>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(name: DisplayName, outbound: Box<dyn Outbound>) -> Self {
        Self {
            id: ConnectionId::new(),
            name,
            outbound: Mutex::new(outbound),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &DisplayName {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    /// Write one frame, giving up after `deadline`.
    pub async fn deliver(&self, text: &str, deadline: Duration) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut outbound = self.outbound.lock().await;
        match tokio::time::timeout(deadline, outbound.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::WriteTimeout(deadline)),
        }
    }

    /// Close the transport once. Later calls are no-ops.
    ///
    /// The close frame itself is bounded by `deadline` so a stalled peer
    /// cannot hold the caller.
    pub async fn close(&self, closure: Closure, reason: &str, deadline: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        let mut outbound = self.outbound.lock().await;
        if tokio::time::timeout(deadline, outbound.close(closure, reason))
            .await
            .is_err()
        {
            tracing::debug!(conn = %self.id, "close frame timed out");
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
