//! Monitoring Module
//!
//! Run-time checks and timing for provisioning runs.
//!
//! # Components
//!
//! - [`PhaseTimeline`]: phase start/end timing for the run summary
//! - [`ensure_free_space`]: free disk space check before downloading

pub mod disk;
pub mod timeline;

pub use disk::{available_space_mb, ensure_free_space, DEFAULT_MIN_FREE_MB};
pub use timeline::{format_duration, Phase, PhaseStatus, PhaseTimeline};
