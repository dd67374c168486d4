use sabr_manifest::{ManifestError, TrackType};
use sabr_stream::{IndexError, SessionError};
use thiserror::Error;

/// Errors surfaced to the playback pipeline.
///
/// Benign end-of-stream conditions never appear here; they are resolved by
/// the chunk source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SabrError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Load failure the fallback policy could not absorb.
    #[error("{track} representation {representation} failed at segment {segment:?}: {source}")]
    LoadFailed {
        track: TrackType,
        representation: usize,
        segment: Option<u64>,
        source: SessionError,
    },

    #[error("invalid track selection: {0}")]
    InvalidSelection(String),

    #[error("media period not prepared")]
    NotPrepared,

    #[error("media period released")]
    Released,
}

impl SabrError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Session(SessionError::Cancelled))
    }
}

pub type SabrResult<T> = Result<T, SabrError>;
