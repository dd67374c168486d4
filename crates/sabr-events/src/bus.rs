use tokio::sync::broadcast;

use crate::SabrEvent;

/// Event bus shared by every component of one playback.
///
/// `publish()` is synchronous and safe from the blocking loader thread.
/// Without subscribers events are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SabrEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: SabrEvent) {
        let _ = self.tx.send(event);
    }

    /// Slow subscribers receive `RecvError::Lagged(n)` instead of blocking producers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SabrEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
