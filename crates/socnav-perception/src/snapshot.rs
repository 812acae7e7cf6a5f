//! [`AgentSnapshotStore`] – latest-batch hand-off between the perception
//! feed and the map-update cycle.
//!
//! The producer installs each delivered batch with
//! [`AgentSnapshotStore::replace`]; the consumer grabs the current one with
//! [`AgentSnapshotStore::read_snapshot`].  The store holds an immutable
//! `Arc<AgentSnapshot>` behind a single mutex, so both operations only hold
//! the lock for a pointer swap or clone and a reader can never see half of
//! two batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use socnav_types::AgentSnapshot;
use tracing::trace;

/// Shared slot holding the most recently delivered [`AgentSnapshot`].
#[derive(Debug, Default)]
pub struct AgentSnapshotStore {
    current: Mutex<Arc<AgentSnapshot>>,
    version: AtomicU64,
}

impl AgentSnapshotStore {
    /// Create a store holding the empty pre-delivery snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically install `snapshot`, discarding the previous one.
    pub fn replace(&self, snapshot: AgentSnapshot) {
        let incoming = Arc::new(snapshot);
        let count = incoming.len();
        let previous = {
            let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, incoming)
        };
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(version, observations = count, "agent snapshot replaced");
        // The old batch is released here, outside the lock.
        drop(previous);
    }

    /// Return the snapshot current at the moment the lock is taken.
    pub fn read_snapshot(&self) -> Arc<AgentSnapshot> {
        let slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&slot)
    }

    /// Number of deliveries installed so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
