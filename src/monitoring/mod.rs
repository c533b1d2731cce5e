//! Monitoring Module
//!
//! Provides utilities for tracking a run and sizing it against the host.
//!
//! # Components
//!
//! - [`PhaseTimeline`]: When each lifecycle phase started and how long it lasted
//! - [`HostCapacity`]: Local cores/memory compared with aggregated demand

pub mod capacity;
pub mod timeline;

pub use capacity::HostCapacity;
pub use timeline::{PhaseEvent, PhaseTimeline};
