#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "test utility crate: unwraps are acceptable"
)]
#![expect(
    clippy::cast_possible_truncation,
    reason = "test utility crate: ladder sizes are tiny"
)]
#![expect(
    clippy::missing_panics_doc,
    reason = "test utility crate: panic documentation not needed"
)]

//! Shared test utilities for the sabr workspace.

pub mod fixtures;
mod scripted;

pub use scripted::{DemuxRecorder, ScriptedDemux};
