//! `socnav-perception` – people as seen by the costmap.
//!
//! Takes the batches of detected objects delivered by the perception feed
//! and expresses the people among them in the costmap's global frame.
//!
//! # Modules
//!
//! - [`transform`] – [`TfBuffer`][transform::TfBuffer]: time-stamped tree of
//!   named reference frames, exposed to the rest of the stack through the
//!   [`FrameTransformer`][transform::FrameTransformer] capability.
//! - [`snapshot`] – [`AgentSnapshotStore`][snapshot::AgentSnapshotStore]:
//!   the single shared slot where the feed drops its latest batch and the
//!   map-update cycle picks it up.
//! - [`reproject`] – [`AgentReprojector`][reproject::AgentReprojector]:
//!   filters a batch down to people and transforms their position and
//!   velocity, dropping (and counting) the ones whose transform fails.

pub mod reproject;
pub mod snapshot;
pub mod transform;

pub use reproject::{AgentReprojector, Reprojection, ReprojectionStats};
pub use snapshot::AgentSnapshotStore;
pub use transform::{FrameTransformer, IdentityTransformer, Quaternion, TfBuffer, Transform3D};
