//! `socnav-runtime` – the map-update side of the social layers.
//!
//! # Modules
//!
//! - [`dirty_region`] – [`DirtyRegionTracker`][dirty_region::DirtyRegionTracker]:
//!   folds the people box into the caller's box and keeps last cycle's
//!   rectangle so vacated cells are refreshed too.
//! - [`social_layer`] – [`SocialLayer`][social_layer::SocialLayer]: one
//!   layer's worth of state; runs read → reproject → fold on every
//!   map-update cycle.
//! - [`ingest`] – [`spawn_ingest`][ingest::spawn_ingest]: Tokio task that
//!   copies feed deliveries from the bus into a snapshot store.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber setup with optional OTLP span export.

pub mod dirty_region;
pub mod ingest;
pub mod social_layer;
pub mod telemetry;

pub use dirty_region::DirtyRegionTracker;
pub use ingest::spawn_ingest;
pub use social_layer::{FailureCounters, SocialLayer, SocialLayerConfig};
pub use telemetry::{TelemetryConfig, TracerProviderGuard, init_tracing};
