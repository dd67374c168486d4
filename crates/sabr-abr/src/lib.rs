//! Adaptive track selection for SABR playback.
//!
//! The crate combines three pieces:
//!
//! - [`AbrController`]: throughput and buffer driven choice among live candidates
//! - [`TrackSelection`]: per-representation exclusion state (`Candidate` or
//!   `Excluded { until }`) wrapped around the controller
//! - [`FallbackPolicy`]: decides whether a failed load excludes the failing
//!   representation or is fatal
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use sabr_abr::{AbrMode, AbrOptions, TrackSelection};
//! use web_time::Instant;
//!
//! let opts = AbrOptions {
//!     mode: AbrMode::Auto(Some(1)),
//!     ..AbrOptions::default()
//! };
//! let mut selection = TrackSelection::new(&[500_000, 1_000_000], opts);
//! let now = Instant::now();
//!
//! assert!(selection.exclude(1, Duration::from_secs(5), now));
//! selection.update_selected_track(now);
//! assert_eq!(selection.selected_index(), 0);
//! ```

#![forbid(unsafe_code)]

mod controller;
mod estimator;
mod fallback;
mod selection;
mod types;

pub use controller::{AbrController, AbrDecision, AbrReason};
pub use estimator::{Estimator, ThroughputEstimator};
pub use fallback::{
    DEFAULT_EXCLUSION, DefaultFallbackPolicy, FallbackDecision, FallbackOptions, FallbackPolicy,
    LoadErrorInfo, LoadErrorStatus,
};
#[cfg(any(test, feature = "test-utils"))]
pub use fallback::FallbackPolicyMock;
pub use selection::{RepresentationState, TrackSelection};
pub use types::{AbrMode, AbrOptions, ThroughputSample, ThroughputSampleSource, Variant};
