//! Transform Frame (TF) buffer.
//!
//! Maintains a tree of named reference frames and the time-stamped 3-D
//! rigid-body transforms (translation + quaternion rotation) that relate each
//! frame to its parent.  Given a stamped point and a target frame the buffer
//! walks the tree (BFS, in either direction) and composes the chain of
//! transforms valid at the point's timestamp.
//!
//! Lookups fail the same three ways a robotics TF stack does:
//!
//! | Failure | [`TransformError`] variant |
//! |---|---|
//! | a frame was never published | `LookupUnavailable` |
//! | both frames exist in disjoint trees | `Connectivity` |
//! | an edge's history does not cover the stamp | `Extrapolation` |
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use socnav_perception::transform::{FrameTransformer, Quaternion, TfBuffer, Transform3D};
//! use socnav_types::{PointStamped, Vec3};
//!
//! let tf = TfBuffer::new();
//! // odom sits 2 m along x from map, same orientation.
//! tf.set_static_transform("odom", "map",
//!     Transform3D::new(Vec3::new(2.0, 0.0, 0.0), Quaternion::identity()));
//!
//! let p = PointStamped::new("map", Utc::now(), Vec3::new(1.0, 0.0, 0.0));
//! let out = tf.transform_point(&p, "odom").unwrap();
//! assert!((out.point.x - 3.0).abs() < 1e-9);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use socnav_types::{PointStamped, TransformError, Vec3};

/// How much dynamic-transform history each edge keeps by default.
pub const DEFAULT_CACHE_SECS: i64 = 10;

// ────────────────────────────────────────────────────────────────────────────
// Capability
// ────────────────────────────────────────────────────────────────────────────

/// Converts a stamped point into another named frame.
///
/// This is the only thing the reprojection step needs from a TF stack; the
/// in-process [`TfBuffer`] implements it, and tests substitute their own.
pub trait FrameTransformer: Send + Sync {
    fn transform_point(
        &self,
        point: &PointStamped,
        target_frame: &str,
    ) -> Result<PointStamped, TransformError>;
}

/// Pass-through transformer: every point is returned unchanged, re-tagged
/// with the target frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransformer;

impl FrameTransformer for IdentityTransformer {
    fn transform_point(
        &self,
        point: &PointStamped,
        target_frame: &str,
    ) -> Result<PointStamped, TransformError> {
        Ok(PointStamped::new(target_frame, point.stamp, point.point))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `yaw` radians about +Z.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    fn dot(self, rhs: Self) -> f64 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    fn normalized(self) -> Self {
        let n = self.dot(self).sqrt();
        if n == 0.0 {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Normalised linear interpolation along the shorter arc.
    pub fn nlerp(self, rhs: Self, t: f64) -> Self {
        let rhs = if self.dot(rhs) < 0.0 {
            Self::new(-rhs.w, -rhs.x, -rhs.y, -rhs.z)
        } else {
            rhs
        };
        Self::new(
            self.w + (rhs.w - self.w) * t,
            self.x + (rhs.x - self.x) * t,
            self.y + (rhs.y - self.y) * t,
            self.z + (rhs.z - self.z) * t,
        )
        .normalized()
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform.
///
/// `T_a_b` is the pose of frame B relative to frame A: a point expressed in
/// B is converted into A by rotating it by `rotation` and then adding
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `T_a_b.compose(T_b_c) == T_a_c`.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// `T_a_b.inverse() == T_b_a`.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        let inv_trans = inv_rot.rotate(self.translation).scale(-1.0);
        Self::new(inv_trans, inv_rot)
    }

    /// Express a point given in the child frame in the parent frame.
    pub fn apply(self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }

    /// Blend between `self` (t = 0) and `other` (t = 1).
    pub fn interpolate(self, other: Self, t: f64) -> Self {
        let d = other.translation.sub(self.translation);
        Self::new(
            self.translation.add(d.scale(t)),
            self.rotation.nlerp(other.rotation, t),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Edge history
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum EdgeHistory {
    /// Valid at every time.
    Static(Transform3D),
    /// Samples sorted by ascending stamp.
    Dynamic(VecDeque<(DateTime<Utc>, Transform3D)>),
}

#[derive(Debug)]
struct Edge {
    parent: String,
    /// `T_parent_child`.
    history: EdgeHistory,
}

impl Edge {
    /// Transform valid at `stamp`, or a human-readable extrapolation reason.
    fn sample(&self, stamp: DateTime<Utc>) -> Result<Transform3D, String> {
        let samples = match &self.history {
            EdgeHistory::Static(t) => return Ok(*t),
            EdgeHistory::Dynamic(samples) => samples,
        };
        let (Some((oldest, first)), Some((newest, _))) = (samples.front(), samples.back()) else {
            return Err("no data".to_string());
        };
        if stamp < *oldest {
            return Err(format!("requested time is earlier than the oldest data at {oldest}"));
        }
        if stamp > *newest {
            return Err(format!("requested time is later than the newest data at {newest}"));
        }
        if stamp == *oldest {
            return Ok(*first);
        }
        // `stamp` lies in (oldest, newest]: find the first sample at or after it.
        let idx = samples.partition_point(|(s, _)| *s < stamp);
        let (t1, tf1) = samples[idx];
        let (t0, tf0) = samples[idx - 1];
        if t1 == stamp {
            return Ok(tf1);
        }
        let span = (t1 - t0).num_nanoseconds().unwrap_or(i64::MAX) as f64;
        let offset = (stamp - t0).num_nanoseconds().unwrap_or(0) as f64;
        Ok(tf0.interpolate(tf1, offset / span))
    }
}

#[derive(Debug, Default)]
struct FrameTree {
    /// Keyed by child frame; every frame has at most one parent.
    edges: HashMap<String, Edge>,
    /// Every frame that has appeared as a parent or child.
    frames: HashSet<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// TfBuffer
// ────────────────────────────────────────────────────────────────────────────

/// A thread-safe tree of named reference frames.
///
/// Publishers call [`TfBuffer::set_transform`] /
/// [`TfBuffer::set_static_transform`] from any thread; consumers call
/// [`TfBuffer::lookup`] or go through the [`FrameTransformer`] impl.
#[derive(Debug)]
pub struct TfBuffer {
    tree: RwLock<FrameTree>,
    cache: Duration,
}

impl Default for TfBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TfBuffer {
    /// Create an empty buffer with a [`DEFAULT_CACHE_SECS`] history window.
    pub fn new() -> Self {
        Self::with_cache(Duration::seconds(DEFAULT_CACHE_SECS))
    }

    /// Create an empty buffer that keeps `cache` worth of dynamic history.
    pub fn with_cache(cache: Duration) -> Self {
        Self {
            tree: RwLock::new(FrameTree::default()),
            cache,
        }
    }

    /// Register a transform from `parent_frame` to `child_frame` that is
    /// valid at every time.  Replaces any previous edge of `child_frame`.
    pub fn set_static_transform(
        &self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
    ) {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.frames.insert(parent_frame.to_string());
        tree.frames.insert(child_frame.to_string());
        tree.edges.insert(
            child_frame.to_string(),
            Edge {
                parent: parent_frame.to_string(),
                history: EdgeHistory::Static(transform),
            },
        );
    }

    /// Record a time-stamped sample of the transform from `parent_frame` to
    /// `child_frame`.
    ///
    /// Samples older than the cache window (measured from the newest sample)
    /// are evicted.  Publishing with a different parent re-parents the frame
    /// and drops its old history.
    pub fn set_transform(
        &self,
        parent_frame: &str,
        child_frame: &str,
        stamp: DateTime<Utc>,
        transform: Transform3D,
    ) {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.frames.insert(parent_frame.to_string());
        tree.frames.insert(child_frame.to_string());

        let edge = tree
            .edges
            .entry(child_frame.to_string())
            .or_insert_with(|| Edge {
                parent: parent_frame.to_string(),
                history: EdgeHistory::Dynamic(VecDeque::new()),
            });
        if edge.parent != parent_frame || matches!(edge.history, EdgeHistory::Static(_)) {
            edge.parent = parent_frame.to_string();
            edge.history = EdgeHistory::Dynamic(VecDeque::new());
        }
        let EdgeHistory::Dynamic(samples) = &mut edge.history else {
            return;
        };

        let idx = samples.partition_point(|(s, _)| *s < stamp);
        match samples.get_mut(idx) {
            Some(slot) if slot.0 == stamp => slot.1 = transform,
            _ => samples.insert(idx, (stamp, transform)),
        }

        if let Some(&(newest, _)) = samples.back() {
            let horizon = newest - self.cache;
            while samples.front().is_some_and(|(s, _)| *s < horizon) {
                samples.pop_front();
            }
        }
    }

    /// `true` once `frame` has been mentioned by any published transform.
    pub fn has_frame(&self, frame: &str) -> bool {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.frames.contains(frame)
    }

    /// Compute `T_target_source` valid at `stamp`: the transform that maps
    /// points expressed in `source_frame` into `target_frame`.
    pub fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        stamp: DateTime<Utc>,
    ) -> Result<Transform3D, TransformError> {
        if source_frame == target_frame {
            return Ok(Transform3D::identity());
        }

        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        for frame in [target_frame, source_frame] {
            if !tree.frames.contains(frame) {
                return Err(TransformError::LookupUnavailable {
                    frame: frame.to_string(),
                });
            }
        }

        // BFS from the target; each queue item carries T_target_current.
        let mut queue: VecDeque<(&str, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut extrapolation: Option<String> = None;

        queue.push_back((target_frame, Transform3D::identity()));
        visited.insert(target_frame);

        while let Some((current, accumulated)) = queue.pop_front() {
            // Upward: current -> parent uses the inverse of T_parent_current.
            let up = tree
                .edges
                .get(current)
                .map(|edge| (edge.parent.as_str(), edge, true));
            // Downward: current -> child uses T_current_child directly.
            let down = tree
                .edges
                .iter()
                .filter(|(_, edge)| edge.parent == current)
                .map(|(child, edge)| (child.as_str(), edge, false));

            for (next, edge, inverted) in up.into_iter().chain(down) {
                if visited.contains(next) {
                    continue;
                }
                let step = match edge.sample(stamp) {
                    Ok(t) if inverted => t.inverse(),
                    Ok(t) => t,
                    Err(reason) => {
                        extrapolation.get_or_insert(reason);
                        continue;
                    }
                };
                let composed = accumulated.compose(step);
                if next == source_frame {
                    return Ok(composed);
                }
                visited.insert(next);
                queue.push_back((next, composed));
            }
        }

        Err(match extrapolation {
            Some(reason) => TransformError::Extrapolation {
                source_frame: source_frame.to_string(),
                target_frame: target_frame.to_string(),
                requested: stamp,
                reason,
            },
            None => TransformError::Connectivity {
                source_frame: source_frame.to_string(),
                target_frame: target_frame.to_string(),
            },
        })
    }
}

impl FrameTransformer for TfBuffer {
    fn transform_point(
        &self,
        point: &PointStamped,
        target_frame: &str,
    ) -> Result<PointStamped, TransformError> {
        let t = self.lookup(target_frame, &point.frame_id, point.stamp)?;
        Ok(PointStamped::new(target_frame, point.stamp, t.apply(point.point)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
