//! Broadcast bus carrying perception feed deliveries.
//!
//! Uses [`tokio::sync::broadcast`] so that every layer subscribed to the
//! feed receives every batch and a slow layer never blocks the producer.
//! Only the newest batch matters to a consumer, so a subscriber that falls
//! behind skips ahead instead of failing.

use socnav_types::{FeedEvent, SocnavError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (batches buffered before the oldest are dropped
/// for slow subscribers).
const DEFAULT_CAPACITY: usize = 16;

/// Shared feed bus. Clone it cheaply – all clones share the same channel.
#[derive(Clone, Debug)]
pub struct FeedBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl FeedBus {
    /// Create a bus buffering up to `capacity` batches per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a delivery to every current subscriber.
    ///
    /// Returns the number of subscribers handed the event, or
    /// [`SocnavError::Channel`] when nobody is listening.
    pub fn publish(&self, event: FeedEvent) -> Result<usize, SocnavError> {
        self.sender
            .send(event)
            .map_err(|e| SocnavError::Channel(format!("feed bus send error: {e}")))
    }

    /// Subscribe to every delivery.
    pub fn subscribe(&self) -> FeedSubscriber {
        FeedSubscriber {
            source_prefix: None,
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to deliveries whose `source` starts with `prefix`.
    pub fn subscribe_source(&self, prefix: impl Into<String>) -> FeedSubscriber {
        FeedSubscriber {
            source_prefix: Some(prefix.into()),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FeedBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Receiving end of a [`FeedBus`].
pub struct FeedSubscriber {
    source_prefix: Option<String>,
    receiver: broadcast::Receiver<FeedEvent>,
}

impl FeedSubscriber {
    /// Wait for the next matching delivery.
    ///
    /// Lag is logged and skipped over.  Returns `None` once every
    /// [`FeedBus`] handle has been dropped.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "feed subscriber lagged; skipping to newest batch");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn matches(&self, event: &FeedEvent) -> bool {
        self.source_prefix
            .as_deref()
            .is_none_or(|prefix| event.source.starts_with(prefix))
    }
}
