use std::time::Duration;

use sabr_abr::AbrReason;
use sabr_manifest::{FormatId, TrackType};

/// Events emitted during SABR playback.
#[derive(Clone, Debug)]
pub enum SabrEvent {
    /// Native session opened with the initial formats.
    SessionCreated {
        audio: Option<FormatId>,
        video: Option<FormatId>,
    },
    /// One `poll` on the native session returned.
    SegmentsPolled { audio: usize, video: usize },
    /// A track switched representation.
    RepresentationSelected {
        track: TrackType,
        from: usize,
        to: usize,
        reason: AbrReason,
    },
    /// A representation left candidacy after a load error.
    RepresentationExcluded {
        track: TrackType,
        representation: usize,
        duration: Duration,
    },
    /// A media segment was handed to a sample stream.
    ChunkLoaded {
        track: TrackType,
        segment: u64,
        bytes: u64,
        elapsed: Duration,
    },
    /// No more segments for the track.
    EndOfStream { track: TrackType },
    Error { error: String, recoverable: bool },
    /// Native session destroyed.
    SessionDestroyed,
}

impl SabrEvent {
    pub fn track(&self) -> Option<TrackType> {
        match self {
            Self::RepresentationSelected { track, .. }
            | Self::RepresentationExcluded { track, .. }
            | Self::ChunkLoaded { track, .. }
            | Self::EndOfStream { track } => Some(*track),
            _ => None,
        }
    }
}
