use kanal::{Receiver, Sender};
use sabr_manifest::TrackType;

use crate::{Segment, SessionError, SessionResult};

/// Unbounded FIFO of segments for one track.
///
/// The polling side pushes whole batches; the consuming side pops the
/// oldest segment without taking the session lock.
pub struct SegmentQueue {
    track: TrackType,
    tx: Sender<Segment>,
    rx: Receiver<Segment>,
}

impl SegmentQueue {
    pub fn new(track: TrackType) -> Self {
        let (tx, rx) = kanal::unbounded();
        Self { track, tx, rx }
    }

    pub fn track(&self) -> TrackType {
        self.track
    }

    pub fn push_batch(&self, segments: impl IntoIterator<Item = Segment>) -> SessionResult<()> {
        for segment in segments {
            self.tx
                .send(segment)
                .map_err(|_| SessionError::ChannelClosed(self.track))?;
        }
        Ok(())
    }

    pub fn try_pop(&self) -> Option<Segment> {
        match self.rx.try_recv() {
            Ok(segment) => segment,
            Err(e) => {
                tracing::trace!(track = %self.track, error = %e, "segment queue closed");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drops every queued segment, returning how many were dropped.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

impl std::fmt::Debug for SegmentQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentQueue")
            .field("track", &self.track)
            .field("len", &self.len())
            .finish()
    }
}
