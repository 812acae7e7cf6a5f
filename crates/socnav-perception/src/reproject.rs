//! People reprojection.
//!
//! Turns one [`AgentSnapshot`] into the people the costmap can use: every
//! person observation is expressed in the costmap's global frame, together
//! with its velocity, and the x/y extent of the result is returned as a
//! [`BoundingBox`].
//!
//! Velocity is carried through the transform by transforming a second point,
//! `position + velocity`, and differencing the two results.  That works for
//! any rigid relationship between the frames (including rotation) without
//! needing a separate vector-transform API.
//!
//! A transform failure only drops the offending person; the rest of the
//! batch is still processed.

use socnav_types::{
    AgentObservation, AgentSnapshot, BoundingBox, ObjectClass, PointStamped, TransformError,
    TransformedAgent,
};
use tracing::{error, trace};

use crate::transform::FrameTransformer;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

/// Per-cycle tally of what was dropped and why.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReprojectionStats {
    /// Observations whose class was not the person class.
    pub skipped_class: usize,
    pub lookup_failures: usize,
    pub connectivity_failures: usize,
    pub extrapolation_failures: usize,
}

impl ReprojectionStats {
    /// Total number of people lost to transform errors.
    pub fn transform_failures(&self) -> usize {
        self.lookup_failures + self.connectivity_failures + self.extrapolation_failures
    }

    fn record(&mut self, err: &TransformError) {
        match err {
            TransformError::LookupUnavailable { .. } => self.lookup_failures += 1,
            TransformError::Connectivity { .. } => self.connectivity_failures += 1,
            TransformError::Extrapolation { .. } => self.extrapolation_failures += 1,
        }
    }
}

/// Result of reprojecting one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Reprojection {
    /// People that could be expressed in the global frame, in feed order.
    pub agents: Vec<TransformedAgent>,
    /// Extent of `agents` positions; empty when `agents` is.
    pub bounds: BoundingBox,
    pub stats: ReprojectionStats,
}

// ────────────────────────────────────────────────────────────────────────────
// AgentReprojector
// ────────────────────────────────────────────────────────────────────────────

/// Reprojects person observations into a target frame.
#[derive(Debug, Clone)]
pub struct AgentReprojector {
    person_class: ObjectClass,
    /// When set, used instead of the snapshot's own `frame_id`.
    source_frame: Option<String>,
}

impl Default for AgentReprojector {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentReprojector {
    /// Reproject [`ObjectClass::PERSON`] observations, trusting the frame
    /// each snapshot declares.
    pub fn new() -> Self {
        Self {
            person_class: ObjectClass::PERSON,
            source_frame: None,
        }
    }

    /// Treat `class` as the person class instead of the default.
    pub fn with_person_class(mut self, class: ObjectClass) -> Self {
        self.person_class = class;
        self
    }

    /// Always interpret observations in `frame`, whatever the batch says.
    pub fn with_source_frame(mut self, frame: impl Into<String>) -> Self {
        self.source_frame = Some(frame.into());
        self
    }

    /// Express every person of `snapshot` in `global_frame`.
    pub fn reproject(
        &self,
        snapshot: &AgentSnapshot,
        global_frame: &str,
        transformer: &dyn FrameTransformer,
    ) -> Reprojection {
        let source_frame = self.source_frame.as_deref().unwrap_or(&snapshot.frame_id);
        let mut agents = Vec::with_capacity(snapshot.len());
        let mut stats = ReprojectionStats::default();

        for observation in &snapshot.observations {
            if observation.class != self.person_class {
                stats.skipped_class += 1;
                continue;
            }
            let result = Self::transform_agent(
                observation,
                source_frame,
                snapshot,
                global_frame,
                transformer,
            );
            match result {
                Ok(agent) => agents.push(agent),
                Err(err) => {
                    match &err {
                        TransformError::LookupUnavailable { .. } => {
                            error!(error = %err, "No transform available");
                        }
                        TransformError::Connectivity { .. } => {
                            error!(error = %err, "Connectivity error");
                        }
                        TransformError::Extrapolation { .. } => {
                            error!(error = %err, "Extrapolation error");
                        }
                    }
                    stats.record(&err);
                }
            }
        }

        let bounds = BoundingBox::from_points(agents.iter().map(|a| &a.position));
        trace!(
            people = agents.len(),
            dropped = stats.transform_failures(),
            "snapshot reprojected"
        );
        Reprojection {
            agents,
            bounds,
            stats,
        }
    }

    fn transform_agent(
        observation: &AgentObservation,
        source_frame: &str,
        snapshot: &AgentSnapshot,
        global_frame: &str,
        transformer: &dyn FrameTransformer,
    ) -> Result<TransformedAgent, TransformError> {
        let mut point = PointStamped::new(source_frame, snapshot.stamp, observation.position);
        let position = transformer.transform_point(&point, global_frame)?.point;

        point.point = observation.position.add(observation.velocity);
        let ahead = transformer.transform_point(&point, global_frame)?.point;

        Ok(TransformedAgent {
            position,
            velocity: ahead.sub(position),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{IdentityTransformer, Quaternion, TfBuffer, Transform3D};
    use chrono::Utc;
    use socnav_types::Vec3;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EPS: f64 = 1e-9;

    fn person(x: f64, y: f64, vx: f64, vy: f64) -> AgentObservation {
        AgentObservation::person(Vec3::new(x, y, 0.0), Vec3::new(vx, vy, 0.0))
    }

    /// Fails every `n`-th call (1-based) with a lookup error, otherwise
    /// behaves like the identity.
    struct FlakyTransformer {
        calls: AtomicUsize,
        fail_on_call: usize,
    }

    impl FrameTransformer for FlakyTransformer {
        fn transform_point(
            &self,
            point: &PointStamped,
            target_frame: &str,
        ) -> Result<PointStamped, TransformError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on_call {
                return Err(TransformError::LookupUnavailable {
                    frame: target_frame.to_string(),
                });
            }
            IdentityTransformer.transform_point(point, target_frame)
        }
    }

    #[test]
    fn empty_snapshot_yields_empty_output() {
        let snap = AgentSnapshot::default();
        let out = AgentReprojector::new().reproject(&snap, "map", &IdentityTransformer);
        assert!(out.agents.is_empty());
        assert!(out.bounds.is_empty());
        assert_eq!(out.bounds, BoundingBox::empty());
        assert_eq!(out.stats, ReprojectionStats::default());
    }

    #[test]
    fn non_person_classes_are_excluded() {
        let obs = (0..10u8)
            .filter(|c| *c != 4)
            .map(|c| AgentObservation::new(ObjectClass(c), Vec3::new(1.0, 1.0, 0.0), Vec3::zero()))
            .collect();
        let snap = AgentSnapshot::new(Utc::now(), obs);
        let out = AgentReprojector::new().reproject(&snap, "map", &IdentityTransformer);
        assert!(out.agents.is_empty());
        assert_eq!(out.stats.skipped_class, 9);
        assert!(out.bounds.is_empty());
    }

    #[test]
    fn identity_transform_round_trips_position_and_velocity() {
        let snap = AgentSnapshot::new(Utc::now(), vec![person(2.5, -1.25, 0.75, -0.5)]);
        let out = AgentReprojector::new().reproject(&snap, "map", &IdentityTransformer);
        assert_eq!(out.agents.len(), 1);
        assert_eq!(out.agents[0].position, Vec3::new(2.5, -1.25, 0.0));
        assert_eq!(out.agents[0].velocity, Vec3::new(0.75, -0.5, 0.0));
    }

    #[test]
    fn mixed_batch_scenario() {
        let snap = AgentSnapshot::new(
            Utc::now(),
            vec![
                AgentObservation::new(
                    ObjectClass(4),
                    Vec3::new(1.0, 1.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                ),
                AgentObservation::new(ObjectClass(2), Vec3::new(5.0, 5.0, 0.0), Vec3::zero()),
            ],
        );
        // Global frame equals the source frame: the buffer answers with identity.
        let tf = TfBuffer::new();
        let out = AgentReprojector::new().reproject(&snap, "map", &tf);

        assert_eq!(out.agents.len(), 1);
        assert_eq!(out.agents[0].position, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(out.agents[0].velocity, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(out.bounds, BoundingBox::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn failure_for_one_agent_does_not_stop_the_rest() {
        let snap = AgentSnapshot::new(
            Utc::now(),
            vec![
                person(0.0, 0.0, 0.0, 0.0),
                person(1.0, 1.0, 0.0, 0.0),
                person(2.0, 2.0, 0.0, 0.0),
            ],
        );
        // Call 3 is the position lookup of the second person.
        let flaky = FlakyTransformer {
            calls: AtomicUsize::new(0),
            fail_on_call: 3,
        };
        let out = AgentReprojector::new().reproject(&snap, "odom", &flaky);

        assert_eq!(out.agents.len(), 2);
        assert_eq!(out.agents[0].position, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(out.agents[1].position, Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(out.stats.lookup_failures, 1);
        assert_eq!(out.bounds, BoundingBox::new(0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn failed_velocity_lookup_drops_the_whole_agent() {
        let snap = AgentSnapshot::new(Utc::now(), vec![person(3.0, 3.0, 1.0, 0.0)]);
        let flaky = FlakyTransformer {
            calls: AtomicUsize::new(0),
            fail_on_call: 2,
        };
        let out = AgentReprojector::new().reproject(&snap, "odom", &flaky);
        assert!(out.agents.is_empty());
        assert!(out.bounds.is_empty());
        assert_eq!(out.stats.transform_failures(), 1);
    }

    #[test]
    fn velocity_is_rotated_with_the_frame() {
        // odom is map rotated by +90° about Z and shifted by (10, 0).
        let tf = TfBuffer::new();
        tf.set_static_transform(
            "odom",
            "map",
            Transform3D::new(Vec3::new(10.0, 0.0, 0.0), Quaternion::from_yaw(FRAC_PI_2)),
        );
        let snap = AgentSnapshot::new(Utc::now(), vec![person(1.0, 0.0, 1.0, 0.0)]);
        let out = AgentReprojector::new().reproject(&snap, "odom", &tf);

        let agent = out.agents[0];
        assert!((agent.position.x - 10.0).abs() < EPS);
        assert!((agent.position.y - 1.0).abs() < EPS);
        // +x velocity in map points along +y in odom; translation cancels out.
        assert!(agent.velocity.x.abs() < EPS);
        assert!((agent.velocity.y - 1.0).abs() < EPS);
    }

    #[test]
    fn unknown_global_frame_counts_lookup_failures() {
        let tf = TfBuffer::new();
        tf.set_static_transform("odom", "map", Transform3D::identity());
        let snap = AgentSnapshot::new(
            Utc::now(),
            vec![person(0.0, 0.0, 0.0, 0.0), person(1.0, 0.0, 0.0, 0.0)],
        );
        let out = AgentReprojector::new().reproject(&snap, "ghost", &tf);
        assert!(out.agents.is_empty());
        assert_eq!(out.stats.lookup_failures, 2);
    }

    #[test]
    fn source_frame_override_and_custom_class() {
        let tf = TfBuffer::new();
        tf.set_static_transform(
            "odom",
            "camera",
            Transform3D::new(Vec3::new(0.0, 5.0, 0.0), Quaternion::identity()),
        );
        let snap = AgentSnapshot::new(
            Utc::now(),
            vec![AgentObservation::new(ObjectClass(9), Vec3::new(1.0, 0.0, 0.0), Vec3::zero())],
        );
        let reprojector = AgentReprojector::new()
            .with_person_class(ObjectClass(9))
            .with_source_frame("camera");
        let out = reprojector.reproject(&snap, "odom", &tf);
        assert_eq!(out.agents.len(), 1);
        assert!((out.agents[0].position.y - 5.0).abs() < EPS);
    }
}
