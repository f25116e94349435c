//! Topic-based event fan-out
//!
//! Drivers publish events (errors, decoded notifications) without knowing who
//! listens. Each subscriber gets its own bounded channel; publishing never
//! blocks the worker that produced the event.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

/// Per-subscriber channel capacity
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Topic that matches every event
const ALL_TOPICS: &str = "*";

/// Events that can be routed by topic name
pub trait Topic {
    /// Topic this event is published on
    fn topic(&self) -> &'static str;
}

struct Subscriber<E> {
    topic: &'static str,
    tx: Sender<E>,
}

/// Event bus with per-topic subscribers
pub struct EventBus<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
}

impl<E: Topic + Clone> EventBus<E> {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive events published on `topic`
    pub fn subscribe(&self, topic: &'static str) -> Receiver<E> {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        self.subscribers.lock().push(Subscriber { topic, tx });
        rx
    }

    /// Receive every event regardless of topic
    pub fn subscribe_all(&self) -> Receiver<E> {
        self.subscribe(ALL_TOPICS)
    }

    /// Deliver `event` to matching subscribers
    ///
    /// Subscribers whose channel is full miss this event; subscribers whose
    /// receiver was dropped are removed.
    pub fn publish(&self, event: E) {
        let topic = event.topic();
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if sub.topic != topic && sub.topic != ALL_TOPICS {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::debug!("Subscriber to '{}' is full, dropping event", sub.topic);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Topic + Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
