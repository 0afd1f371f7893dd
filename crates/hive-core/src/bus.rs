//! The shared event bus.
//!
//! Every running bee publishes through an [`EventSink`]; exactly one
//! dispatcher drains the matching [`EventReceiver`]. Sending is a
//! rendezvous: [`EventSink::send`] only returns once the dispatcher has
//! taken the event, so a bee's own events reach the dispatcher in the order
//! it sent them.
//!
//! ```text
//! ┌──────────┐  send()   ┌──────────┐  recv()   ┌────────────┐
//! │ bee "a"  │──────────▶│          │──────────▶│ dispatcher │
//! ├──────────┤           │ EventBus │           └────────────┘
//! │ bee "b"  │──────────▶│          │
//! └──────────┘           └──────────┘
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

use crate::error::{BeeError, BeeResult};
use crate::event::Event;

struct Envelope {
    event: Event,
    accepted: oneshot::Sender<()>,
}

/// Write side of the bus. Closing it lets the dispatcher drain and exit.
pub struct EventBus {
    tx: RwLock<Option<mpsc::Sender<Envelope>>>,
}

impl EventBus {
    /// Creates a bus together with its single receiver.
    pub fn new() -> (Arc<Self>, EventReceiver) {
        let (tx, rx) = mpsc::channel(1);
        let bus = Arc::new(Self {
            tx: RwLock::new(Some(tx)),
        });
        (bus, EventReceiver { rx })
    }

    /// Returns a publishing handle for a bee.
    pub fn sink(self: &Arc<Self>) -> EventSink {
        EventSink {
            bus: Arc::clone(self),
        }
    }

    /// Stops accepting new events. Events already handed off are still
    /// delivered.
    pub fn close(&self) {
        self.tx.write().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }
}

/// A cloneable publishing handle.
#[derive(Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
}

impl EventSink {
    /// Publishes `event`, waiting until the dispatcher accepts it.
    pub async fn send(&self, event: Event) -> BeeResult<()> {
        let tx = self.bus.tx.read().clone().ok_or(BeeError::BusClosed)?;
        let (accepted, on_accept) = oneshot::channel();
        tx.send(Envelope { event, accepted })
            .await
            .map_err(|_| BeeError::BusClosed)?;
        drop(tx);
        on_accept.await.map_err(|_| BeeError::BusClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.bus.is_closed()
    }
}

/// Read side of the bus, owned by the dispatcher.
pub struct EventReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl EventReceiver {
    /// Takes the next event and releases its publisher. Returns `None`
    /// once the bus is closed and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        let envelope = self.rx.recv().await?;
        let _ = envelope.accepted.send(());
        Some(envelope.event)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_send_waits_for_dispatcher() {
        let (bus, mut rx) = EventBus::new();
        let sink = bus.sink();

        let publisher = tokio::spawn(async move { sink.send(Event::new("clock", "tick")).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!publisher.is_finished());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "tick");
        assert!(publisher.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_order_per_publisher() {
        let (bus, mut rx) = EventBus::new();
        let sink = bus.sink();

        tokio::spawn(async move {
            for i in 0..5 {
                sink.send(Event::new("clock", format!("tick{i}"))).await.unwrap();
            }
        });

        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap().name, format!("tick{i}"));
        }
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (bus, mut rx) = EventBus::new();
        let sink = bus.sink();

        bus.close();
        assert!(matches!(
            sink.send(Event::new("clock", "tick")).await,
            Err(BeeError::BusClosed)
        ));
        assert!(rx.recv().await.is_none());
    }
}
