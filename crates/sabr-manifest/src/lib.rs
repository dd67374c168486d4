#![forbid(unsafe_code)]

//! Static description of the encodings a SABR playback session can choose from.
//!
//! A [`Manifest`] is built once per playback from upstream stream metadata
//! (see [`ManifestBuilder`]) and never mutated afterwards. It groups
//! [`Representation`]s into [`AdaptationSet`]s that share a [`TrackType`].

mod builder;
mod error;
mod manifest;
mod types;

pub use builder::{ManifestBuilder, StreamDescriptor};
pub use error::{ManifestError, ManifestResult};
pub use manifest::{AdaptationSet, Manifest};
pub use types::{AudioRole, FormatId, MediaAttributes, Representation, TrackType};
