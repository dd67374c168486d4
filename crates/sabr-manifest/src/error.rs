use thiserror::Error;

use crate::{FormatId, TrackType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("duplicate format {0} in adaptation set")]
    DuplicateFormat(FormatId),

    #[error("adaptation set of {expected:?} contains a {found:?} representation")]
    MixedTrackTypes { expected: TrackType, found: TrackType },

    #[error("adaptation set is empty")]
    EmptyAdaptationSet,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid session uri: {0}")]
    InvalidUri(String),
}

pub type ManifestResult<T> = Result<T, ManifestError>;
