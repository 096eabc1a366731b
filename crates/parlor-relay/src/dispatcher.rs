//! Broadcast fan-out.
//!
//! Every lifecycle handler pushes onto one unbounded queue; a single
//! dispatcher drains it in order and writes each message to every registered
//! connection, the sender included.

use std::sync::Arc;
use std::time::Duration;

use parlor_core::ChatMessage;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::connection::Closure;
use crate::registry::Registry;

/// Producer side of the broadcast queue. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ChatMessage>,
}

impl Outbox {
    pub fn enqueue(&self, msg: ChatMessage) {
        if self.tx.send(msg).is_err() {
            // Only possible once the dispatcher has stopped during shutdown.
            warn!("broadcast queue closed; message dropped");
        }
    }
}

#[cfg(test)]
impl Outbox {
    /// An outbox whose queue is read directly instead of by a dispatcher.
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

/// The single consumer of the broadcast queue.
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<ChatMessage>,
    registry: Arc<Registry>,
    write_timeout: Duration,
}

impl Dispatcher {
    /// Create the queue and its consumer.
    pub fn new(registry: Arc<Registry>, write_timeout: Duration) -> (Outbox, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            rx,
            registry,
            write_timeout,
        };
        (Outbox { tx }, dispatcher)
    }

    /// Drain the queue until every [`Outbox`] is dropped.
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            let _ = self.dispatch(&msg).await;
        }
        debug!("broadcast queue closed; dispatcher stopping");
    }

    /// Deliver one message to every registered connection.
    ///
    /// A recipient whose write fails or times out is closed abnormally and
    /// removed before the registry lock is released; the rest of the pass
    /// carries on.
    pub async fn dispatch(&self, msg: &ChatMessage) -> Delivery {
        let text: Arc<str> = match msg.encode() {
            Ok(text) => text.into(),
            Err(e) => {
                error!("failed to encode broadcast: {e}");
                return Delivery::default();
            }
        };

        let deadline = self.write_timeout;
        let sweep = self
            .registry
            .retain(|handle| {
                let text = Arc::clone(&text);
                async move {
                    match handle.deliver(&text, deadline).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(
                                conn = %handle.id(),
                                user = %handle.name(),
                                "error sending message to client: {e}"
                            );
                            handle
                                .close(Closure::Abnormal, "failed to send message", deadline)
                                .await;
                            false
                        }
                    }
                }
            })
            .await;

        let delivery = Delivery {
            delivered: sweep.kept,
            dropped: sweep.dropped.len(),
        };
        debug!(
            kind = msg.kind.as_str(),
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "broadcast complete"
        );
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{Sent, broken, name, recording, stalled};
    use chrono::Utc;
    use serde_json::Value;

    const DEADLINE: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<Registry>, Outbox, Dispatcher) {
        let registry = Arc::new(Registry::new());
        let (outbox, dispatcher) = Dispatcher::new(Arc::clone(&registry), DEADLINE);
        (registry, outbox, dispatcher)
    }

    fn content(sent: Option<Sent>) -> String {
        match sent {
            Some(Sent::Text(text)) => {
                let v: Value = serde_json::from_str(&text).unwrap();
                v["content"].as_str().unwrap().to_string()
            }
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delivers_to_every_member_including_sender() {
        let (registry, _outbox, dispatcher) = setup();
        let (alice, mut ra) = recording("alice");
        let (bob, mut rb) = recording("bob");
        registry.register(alice).await;
        registry.register(bob).await;

        let msg = ChatMessage::joined(&name("alice"), Utc::now());
        let delivery = dispatcher.dispatch(&msg).await;

        assert_eq!(delivery, Delivery { delivered: 2, dropped: 0 });
        assert_eq!(content(ra.recv().await), "alice has joined the chat");
        assert_eq!(content(rb.recv().await), "alice has joined the chat");
    }

    #[tokio::test]
    async fn empty_registry_is_a_noop() {
        let (_registry, _outbox, dispatcher) = setup();
        let msg = ChatMessage::system("anyone?", Utc::now());
        assert_eq!(dispatcher.dispatch(&msg).await, Delivery::default());
    }

    #[tokio::test]
    async fn failed_recipient_is_removed_and_others_still_receive() {
        let (registry, _outbox, dispatcher) = setup();
        let (alice, mut ra) = recording("alice");
        let bob = broken("bob");
        let (carol, mut rc) = recording("carol");
        registry.register(alice).await;
        registry.register(Arc::clone(&bob)).await;
        registry.register(carol).await;

        let delivery = dispatcher
            .dispatch(&ChatMessage::system("first", Utc::now()))
            .await;

        assert_eq!(delivery, Delivery { delivered: 2, dropped: 1 });
        assert!(!registry.contains(bob.id()).await);
        assert!(bob.is_closed());
        assert_eq!(content(ra.recv().await), "first");
        assert_eq!(content(rc.recv().await), "first");

        let delivery = dispatcher
            .dispatch(&ChatMessage::system("second", Utc::now()))
            .await;
        assert_eq!(delivery, Delivery { delivered: 2, dropped: 0 });
    }

    #[tokio::test]
    async fn abnormal_close_is_sent_to_failed_recipient() {
        let (registry, _outbox, dispatcher) = setup();
        let (alice, mut ra) = recording("alice");
        registry.register(Arc::clone(&alice)).await;
        alice.close(Closure::Abnormal, "gone", DEADLINE).await;
        assert_eq!(ra.recv().await, Some(Sent::Close(Closure::Abnormal)));

        // Already-closed handles fail delivery and get dropped.
        let delivery = dispatcher
            .dispatch(&ChatMessage::system("hello", Utc::now()))
            .await;
        assert_eq!(delivery.dropped, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_recipient_is_bounded_by_write_deadline() {
        let (registry, _outbox, dispatcher) = setup();
        let (alice, mut ra) = recording("alice");
        let carol = stalled("carol");
        registry.register(alice).await;
        registry.register(Arc::clone(&carol)).await;

        let delivery = dispatcher
            .dispatch(&ChatMessage::system("tick", Utc::now()))
            .await;

        assert_eq!(delivery, Delivery { delivered: 1, dropped: 1 });
        assert!(!registry.contains(carol.id()).await);
        assert_eq!(content(ra.recv().await), "tick");
    }

    #[tokio::test]
    async fn run_preserves_queue_order() {
        let (registry, outbox, dispatcher) = setup();
        let (alice, mut ra) = recording("alice");
        registry.register(alice).await;

        let task = tokio::spawn(dispatcher.run());
        for i in 0..50 {
            outbox.enqueue(ChatMessage::system(format!("msg {i}"), Utc::now()));
        }
        for i in 0..50 {
            assert_eq!(content(ra.recv().await), format!("msg {i}"));
        }

        drop(outbox);
        task.await.unwrap();
    }
}
