//! Feed ingest – bridges the [`FeedBus`][socnav_middleware::FeedBus] into an
//! [`AgentSnapshotStore`].
//!
//! The ingest task is the producer side of the hand-off: it runs on its own
//! Tokio task, at whatever cadence the feed delivers, and only ever touches
//! the store through [`AgentSnapshotStore::replace`].

use std::sync::Arc;

use socnav_middleware::FeedSubscriber;
use socnav_perception::AgentSnapshotStore;
use tokio::task::JoinHandle;
use tracing::{info, trace};

/// Spawn a task that installs every delivery received on `subscriber` into
/// `store`.
///
/// The task ends when the bus closes and resolves to the number of batches
/// installed.
pub fn spawn_ingest(
    mut subscriber: FeedSubscriber,
    store: Arc<AgentSnapshotStore>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut delivered = 0u64;
        while let Some(event) = subscriber.recv().await {
            trace!(
                id = %event.id,
                source = %event.source,
                observations = event.snapshot.len(),
                "feed delivery"
            );
            store.replace(event.snapshot);
            delivered += 1;
        }
        info!(delivered, "feed closed; ingest stopped");
        delivered
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use socnav_middleware::FeedBus;
    use socnav_types::{AgentObservation, AgentSnapshot, FeedEvent, Vec3};

    #[tokio::test]
    async fn deliveries_land_in_the_store() -> Result<(), Box<dyn std::error::Error>> {
        let bus = FeedBus::default();
        let store = Arc::new(AgentSnapshotStore::new());
        let handle = spawn_ingest(bus.subscribe(), Arc::clone(&store));

        for n in 1..=3 {
            let obs = (0..n)
                .map(|i| AgentObservation::person(Vec3::new(i as f64, 0.0, 0.0), Vec3::zero()))
                .collect();
            bus.publish(FeedEvent::new("tracker", AgentSnapshot::new(Utc::now(), obs)))?;
        }
        drop(bus);

        let delivered = handle.await?;
        assert_eq!(delivered, 3);
        assert_eq!(store.version(), 3);
        assert_eq!(store.read_snapshot().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn closed_bus_stops_immediately() -> Result<(), Box<dyn std::error::Error>> {
        let bus = FeedBus::default();
        let store = Arc::new(AgentSnapshotStore::new());
        let handle = spawn_ingest(bus.subscribe(), Arc::clone(&store));
        drop(bus);

        assert_eq!(handle.await?, 0);
        assert!(store.read_snapshot().is_empty());
        Ok(())
    }
}
