#![forbid(unsafe_code)]

//! Boundary between SABR playback and the native multiplexed session.
//!
//! The native side owns one server connection and splits it into timed
//! [`Segment`]s per track. This crate wraps it as:
//!
//! - [`NativeDemux`]: the four-call foreign boundary (`initialize`, `poll`,
//!   `select_format`, `destroy`)
//! - [`StreamSession`]: the owned handle, destroyed exactly once
//! - [`SessionDriver`]: single-writer polling that fans batches out to one
//!   [`SegmentQueue`] per track, read through [`SegmentReader`]s
//! - [`ChunkIndex`]: per-representation segment timing table

mod demux;
mod driver;
mod error;
mod index;
mod queue;
mod retry;
mod segment;
mod session;

pub use demux::{NativeDemux, PollBatch, SessionParams};
pub use driver::{DriverOptions, SegmentReader, SessionDriver};
pub use error::{DemuxError, IndexError, SessionError, SessionResult};
pub use index::ChunkIndex;
pub use queue::SegmentQueue;
pub use retry::RetryPolicy;
pub use segment::{Segment, SegmentCursor, SegmentKind};
pub use session::StreamSession;
