#![forbid(unsafe_code)]

//! Client-side adaptive streaming over a server-multiplexed SABR session.
//!
//! One native session delivers interleaved audio and video; this crate turns
//! it into pull-based sample streams for a playback pipeline:
//!
//! - [`MediaPeriod`]: track groups, selection, seeking, loading and release
//! - [`ChunkSampleStream`]: per-track loading and reading of samples
//! - [`ChunkSource`]: what to load next, end-of-stream detection, fallback on
//!   load errors
//! - [`CompositeLoader`]: fair loading across streams, bounded by buffer
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sabr::{AbrMode, LoadingInfo, MediaPeriod, PeriodCallback, SabrConfig, TrackSelectionSpec};
//! # fn run<D: sabr_stream::NativeDemux>(
//! #     manifest: sabr_manifest::Manifest,
//! #     demux: D,
//! #     callback: Box<dyn PeriodCallback>,
//! # ) -> sabr::SabrResult<()> {
//! let mut period = MediaPeriod::new(Arc::new(manifest), demux, SabrConfig::default());
//! period.prepare(callback, 0);
//! let selections = [Some(TrackSelectionSpec { group: 0, mode: AbrMode::Auto(None) })];
//! period.select_tracks(&selections, &[false], 0)?;
//! while period.continue_loading(&LoadingInfo::new(0))? {}
//! period.release()?;
//! # Ok(())
//! # }
//! ```

mod chunk_source;
mod config;
mod error;
mod loader;
mod period;
mod representation;
mod sample_stream;
mod seek;
mod track_group;

pub use chunk_source::{ChunkRequest, ChunkSource, EndReason, LoadErrorAction, MediaChunk};
pub use config::{AbrMode, AbrOptions, SabrConfig};
pub use error::{SabrError, SabrResult};
pub use loader::{CompositeLoader, LoadingInfo, SequenceableLoader};
pub use period::{MediaPeriod, PeriodCallback, StreamKey, TrackSelectionSpec};
pub use representation::RepresentationHolder;
pub use sample_stream::{ChunkSampleStream, ReadResult, Sample, SampleKind};
pub use seek::SeekParameters;
pub use track_group::{TrackFormat, TrackGroup, build_track_groups};
