//! `socnav-types` – shared data model for the social navigation layers.
//!
//! Everything that crosses a crate boundary lives here: the observations
//! delivered by the perception feed, the stamped points handed to the frame
//! transformer, the reprojected agents, and the dirty-region rectangle that
//! is reported back to the costmap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Frame in which the perception feed reports agents unless a batch says
/// otherwise.
pub const DEFAULT_SOURCE_FRAME: &str = "map";

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D point or free vector, in metres (or metres per second for
/// velocities).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

/// A point tagged with the frame it is expressed in and the time at which
/// it was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStamped {
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    pub point: Vec3,
}

impl PointStamped {
    pub fn new(frame_id: impl Into<String>, stamp: DateTime<Utc>, point: Vec3) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp,
            point,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Perception feed
// ────────────────────────────────────────────────────────────────────────────

/// Class tag attached to every detected object by the perception feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectClass(pub u8);

impl ObjectClass {
    /// The only class the social layers care about.
    pub const PERSON: Self = Self(4);

    pub fn is_person(self) -> bool {
        self == Self::PERSON
    }
}

/// A single detected object as reported by the perception feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentObservation {
    /// Object class; only [`ObjectClass::PERSON`] is reprojected.
    #[serde(rename = "object_class")]
    pub class: ObjectClass,
    /// Position in the batch's source frame.
    pub position: Vec3,
    /// Velocity in the batch's source frame (m/s).
    #[serde(default)]
    pub velocity: Vec3,
}

impl AgentObservation {
    pub fn new(class: ObjectClass, position: Vec3, velocity: Vec3) -> Self {
        Self {
            class,
            position,
            velocity,
        }
    }

    /// Shorthand for a person observation.
    pub fn person(position: Vec3, velocity: Vec3) -> Self {
        Self::new(ObjectClass::PERSON, position, velocity)
    }
}

fn default_source_frame() -> String {
    DEFAULT_SOURCE_FRAME.to_string()
}

/// One complete batch delivered by the perception feed.
///
/// A snapshot is replaced wholesale by the next delivery; it is never
/// merged or edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Time at which the batch was observed.
    pub stamp: DateTime<Utc>,
    /// Frame in which every observation of the batch is expressed.
    #[serde(default = "default_source_frame")]
    pub frame_id: String,
    #[serde(default)]
    pub observations: Vec<AgentObservation>,
}

impl AgentSnapshot {
    pub fn new(stamp: DateTime<Utc>, observations: Vec<AgentObservation>) -> Self {
        Self {
            stamp,
            frame_id: default_source_frame(),
            observations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }
}

impl Default for AgentSnapshot {
    /// The state before the first delivery: an empty batch at the epoch.
    fn default() -> Self {
        Self::new(DateTime::<Utc>::default(), Vec::new())
    }
}

/// Envelope for a snapshot travelling over the feed bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: Uuid,
    /// Wall-clock time the envelope was created.
    pub received_at: DateTime<Utc>,
    /// e.g. `"socnav-cli::sim"`
    pub source: String,
    pub snapshot: AgentSnapshot,
}

impl FeedEvent {
    pub fn new(source: impl Into<String>, snapshot: AgentSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            source: source.into(),
            snapshot,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Layer outputs
// ────────────────────────────────────────────────────────────────────────────

/// A person expressed in the costmap's global frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedAgent {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Axis-aligned rectangle in global-frame units.
///
/// The empty box carries `+inf` minima and `-inf` maxima so that folding
/// any point or box into it yields exactly that point or box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The sentinel box that contains nothing.
    pub fn empty() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY)
    }

    /// Smallest box containing the x/y projection of every point.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.expand_to_point(p.x, p.y);
        }
        bounds
    }

    /// `true` until at least one point has been folded in.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn expand_to_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Grow `self` in place so it also covers `other`.
    pub fn expand_to_box(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Per-axis min/max union of two boxes.
    pub fn union(mut self, other: &Self) -> Self {
        self.expand_to_box(other);
        self
    }

    /// `true` if `other` lies entirely inside `self`. The empty box is
    /// contained in everything.
    pub fn contains(&self, other: &Self) -> bool {
        other.is_empty()
            || (self.min_x <= other.min_x
                && self.min_y <= other.min_y
                && self.max_x >= other.max_x
                && self.max_y >= other.max_y)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Why a point could not be expressed in the requested frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("No transform available for frame '{frame}'")]
    LookupUnavailable { frame: String },

    #[error("Frames '{source_frame}' and '{target_frame}' are not connected")]
    Connectivity {
        source_frame: String,
        target_frame: String,
    },

    #[error("Cannot transform '{source_frame}' -> '{target_frame}' at {requested}: {reason}")]
    Extrapolation {
        source_frame: String,
        target_frame: String,
        requested: DateTime<Utc>,
        reason: String,
    },
}

/// Errors raised outside the per-agent transform path.
#[derive(Error, Debug)]
pub enum SocnavError {
    #[error("Feed channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_message_decodes_with_default_frame() {
        let json = r#"{
            "stamp": "2024-05-01T12:00:00Z",
            "observations": [
                { "object_class": 4, "position": { "x": 1.0, "y": 2.0, "z": 0.0 },
                  "velocity": { "x": 0.5, "y": 0.0, "z": 0.0 } },
                { "object_class": 2, "position": { "x": 5.0, "y": 5.0, "z": 0.0 } }
            ]
        }"#;
        let snapshot: AgentSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.frame_id, "map");
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.observations[0].class.is_person());
        assert!(!snapshot.observations[1].class.is_person());
        assert_eq!(snapshot.observations[1].velocity, Vec3::zero());
    }

    #[test]
    fn default_snapshot_is_empty() {
        let snapshot = AgentSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.frame_id, DEFAULT_SOURCE_FRAME);
    }

    #[test]
    fn empty_box_absorbs_first_point() {
        let mut b = BoundingBox::empty();
        assert!(b.is_empty());
        b.expand_to_point(3.0, -2.0);
        assert!(!b.is_empty());
        assert_eq!(b, BoundingBox::new(3.0, -2.0, 3.0, -2.0));
    }

    #[test]
    fn union_with_empty_is_identity() {
        let b = BoundingBox::new(-1.0, -1.0, 2.0, 2.0);
        assert_eq!(b.union(&BoundingBox::empty()), b);
        assert_eq!(BoundingBox::empty().union(&b), b);
    }

    #[test]
    fn from_points_ignores_z() {
        let pts = [Vec3::new(1.0, 4.0, 9.0), Vec3::new(-2.0, 0.5, -9.0)];
        let b = BoundingBox::from_points(&pts);
        assert_eq!(b, BoundingBox::new(-2.0, 0.5, 1.0, 4.0));
    }

    #[test]
    fn contains_checks_every_edge() {
        let outer = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&BoundingBox::new(1.0, 1.0, 9.0, 9.0)));
        assert!(outer.contains(&BoundingBox::empty()));
        assert!(!outer.contains(&BoundingBox::new(-0.1, 1.0, 9.0, 9.0)));
        assert!(!outer.contains(&BoundingBox::new(1.0, 1.0, 9.0, 10.5)));
    }

    #[test]
    fn transform_error_display_names_frames() {
        let err = TransformError::Connectivity {
            source_frame: "map".to_string(),
            target_frame: "odom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("map") && msg.contains("odom"));

        let err = TransformError::LookupUnavailable {
            frame: "base_link".to_string(),
        };
        assert!(err.to_string().contains("base_link"));
    }
}
