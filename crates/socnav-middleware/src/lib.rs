//! `socnav-middleware` – perception feed transport.
//!
//! Moves agent batches from whatever produces them (a tracker, a bag replay,
//! the CLI simulator) to the layers that consume them, without caring about
//! their content.
//!
//! # Modules
//!
//! - [`bus`] – typed broadcast bus of [`FeedEvent`][socnav_types::FeedEvent]s
//!   built on Tokio broadcast channels.

pub mod bus;

pub use bus::{FeedBus, FeedSubscriber};
