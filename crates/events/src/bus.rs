//! Broadcast bus carrying run and project-state events

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out channel for orchestration events.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// simply dropped, and slow subscribers observe `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    published: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish a pre-built envelope. Returns how many subscribers got it.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Wrap `event` in a fresh envelope and publish it.
    pub fn emit(&self, event: Event) -> usize {
        self.publish(EventEnvelope::new(event))
    }

    /// Events published before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total number of events published since creation
    pub fn event_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}
