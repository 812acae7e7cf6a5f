//! [`SocialLayer`] – per-layer consumer of the people feed.
//!
//! One `SocialLayer` backs one derived costmap layer.  The feed side calls
//! [`SocialLayer::people_callback`] (or writes straight into the shared
//! [`AgentSnapshotStore`]); the costmap calls [`SocialLayer::update_bounds`]
//! once per map-update cycle:
//!
//! 1. take the latest snapshot from the store (the only locked step);
//! 2. reproject its people into the costmap's global frame;
//! 3. compute the people box and fold it into the caller's box through the
//!    layer's own [`DirtyRegionTracker`].
//!
//! The reprojected people stay available through
//! [`SocialLayer::transformed_agents`] until the next cycle so the derived
//! layer can paint them.

use std::sync::Arc;

use serde::Deserialize;
use socnav_perception::{AgentReprojector, AgentSnapshotStore, FrameTransformer, ReprojectionStats};
use socnav_types::{AgentSnapshot, BoundingBox, ObjectClass, TransformedAgent};
use tracing::{debug, info, instrument};

use crate::dirty_region::DirtyRegionTracker;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-layer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialLayerConfig {
    /// Disabled layers leave the caller's box untouched.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Class tag the feed uses for people.
    #[serde(default = "default_person_class")]
    pub person_class: u8,
    /// Overrides the frame declared by each batch when set.
    #[serde(default)]
    pub source_frame: Option<String>,
}

fn default_enabled() -> bool {
    true
}
fn default_person_class() -> u8 {
    ObjectClass::PERSON.0
}

impl Default for SocialLayerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            person_class: default_person_class(),
            source_frame: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Counters
// ─────────────────────────────────────────────────────────────────────────────

/// Cumulative consumer-side tallies since the layer was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounters {
    pub cycles: u64,
    pub lookup_failures: u64,
    pub connectivity_failures: u64,
    pub extrapolation_failures: u64,
}

impl FailureCounters {
    fn absorb(&mut self, stats: &ReprojectionStats) {
        self.cycles += 1;
        self.lookup_failures += stats.lookup_failures as u64;
        self.connectivity_failures += stats.connectivity_failures as u64;
        self.extrapolation_failures += stats.extrapolation_failures as u64;
    }

    pub fn total(&self) -> u64 {
        self.lookup_failures + self.connectivity_failures + self.extrapolation_failures
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SocialLayer
// ─────────────────────────────────────────────────────────────────────────────

/// The people-tracking core of a social costmap layer.
pub struct SocialLayer {
    name: String,
    store: Arc<AgentSnapshotStore>,
    transformer: Arc<dyn FrameTransformer>,
    reprojector: AgentReprojector,
    tracker: DirtyRegionTracker,
    transformed: Vec<TransformedAgent>,
    counters: FailureCounters,
    enabled: bool,
    /// Cleared by [`SocialLayer::reset`], set again by the next cycle.
    current: bool,
}

impl SocialLayer {
    /// Create a layer reading from `store` and transforming through
    /// `transformer`.
    pub fn new(
        name: impl Into<String>,
        store: Arc<AgentSnapshotStore>,
        transformer: Arc<dyn FrameTransformer>,
        config: &SocialLayerConfig,
    ) -> Self {
        let mut reprojector =
            AgentReprojector::new().with_person_class(ObjectClass(config.person_class));
        if let Some(frame) = &config.source_frame {
            reprojector = reprojector.with_source_frame(frame.clone());
        }
        let name = name.into();
        info!(layer = %name, enabled = config.enabled, "social layer initialised");
        Self {
            name,
            store,
            transformer,
            reprojector,
            tracker: DirtyRegionTracker::new(),
            transformed: Vec::new(),
            counters: FailureCounters::default(),
            enabled: config.enabled,
            current: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the shared snapshot slot, for wiring up a producer.
    pub fn store(&self) -> &Arc<AgentSnapshotStore> {
        &self.store
    }

    /// Install a freshly delivered batch.
    pub fn people_callback(&self, snapshot: AgentSnapshot) {
        self.store.replace(snapshot);
    }

    /// Run one map-update cycle, expanding `bounds` to the region that must
    /// be refreshed in `global_frame`.
    #[instrument(level = "debug", skip_all, fields(layer = %self.name, frame = global_frame))]
    pub fn update_bounds(&mut self, global_frame: &str, bounds: &mut BoundingBox) {
        if !self.enabled {
            return;
        }

        let snapshot = self.store.read_snapshot();
        let reprojection = self
            .reprojector
            .reproject(&snapshot, global_frame, self.transformer.as_ref());

        self.tracker.fold(&reprojection.bounds, bounds);
        self.counters.absorb(&reprojection.stats);
        self.transformed = reprojection.agents;
        self.current = true;

        debug!(
            people = self.transformed.len(),
            dropped = reprojection.stats.transform_failures(),
            min_x = bounds.min_x,
            min_y = bounds.min_y,
            max_x = bounds.max_x,
            max_y = bounds.max_y,
            "bounds updated"
        );
    }

    /// People reprojected by the most recent cycle.
    pub fn transformed_agents(&self) -> &[TransformedAgent] {
        &self.transformed
    }

    pub fn counters(&self) -> FailureCounters {
        self.counters
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    /// Drop the reprojected people and the dirty-region history.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.transformed.clear();
        self.current = false;
    }
}
