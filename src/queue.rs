//! The in-memory queue between the capture source and the log file writers.
//!
//! [`EventQueue`] broadcasts: every [`EventConsumer`] gets its own copy of each event pushed
//! after it subscribed, in push order. A consumer that falls behind (e.g. a writer stuck on a
//! slow disk) only delays itself; the queue is unbounded, so the producer never waits.

use crate::event::CapturedEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Subscribers = Vec<mpsc::UnboundedSender<Arc<CapturedEvent>>>;

/// An unbounded single-producer, multi-consumer broadcast queue of [`CapturedEvent`]s.
///
/// Cloning an `EventQueue` creates another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new consumer.
    ///
    /// The consumer only sees the events pushed after this call.
    pub fn subscribe(&self) -> EventConsumer {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);

        EventConsumer { rx }
    }

    /// Deliver `event` to every registered consumer.
    ///
    /// Never blocks. Consumers that were dropped are unregistered. Returns the number of
    /// consumers the event was delivered to.
    pub fn push(&self, event: CapturedEvent) -> usize {
        let event = Arc::new(event);
        let mut subscribers = self.lock();

        subscribers.retain(|tx| tx.send(Arc::clone(&event)).is_ok());
        subscribers.len()
    }

    /// The number of registered consumers.
    pub fn consumer_count(&self) -> usize {
        let mut subscribers = self.lock();

        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Unregister every consumer. Their pending events can still be received, after which
    /// [`EventConsumer::recv`] returns `None`.
    pub fn close(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A consumer's private read cursor into an [`EventQueue`].
#[derive(Debug)]
pub struct EventConsumer {
    rx: mpsc::UnboundedReceiver<Arc<CapturedEvent>>,
}

impl EventConsumer {
    /// Wait for the next event.
    ///
    /// Returns `None` once the queue is closed (or every queue handle was dropped) and all the
    /// pending events were received.
    pub async fn recv(&mut self) -> Option<Arc<CapturedEvent>> {
        self.rx.recv().await
    }

    /// Take the next event if one is already available.
    pub fn try_recv(&mut self) -> Option<Arc<CapturedEvent>> {
        self.rx.try_recv().ok()
    }

    /// Take every event that is already available, in order.
    pub fn drain_pending(&mut self) -> Vec<Arc<CapturedEvent>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
