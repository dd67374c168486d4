use std::{collections::HashSet, time::Duration};

use bytes::Bytes;
use url::Url;

use crate::{FormatId, ManifestError, ManifestResult, Representation, TrackType};

/// Ordered group of representations sharing one track type.
///
/// Format identifiers are unique within a set.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptationSet {
    track_type: TrackType,
    representations: Vec<Representation>,
}

impl AdaptationSet {
    pub fn new(track_type: TrackType, representations: Vec<Representation>) -> ManifestResult<Self> {
        if representations.is_empty() {
            return Err(ManifestError::EmptyAdaptationSet);
        }

        let mut seen: HashSet<&FormatId> = HashSet::with_capacity(representations.len());
        for rep in &representations {
            if rep.track_type() != track_type {
                return Err(ManifestError::MixedTrackTypes {
                    expected: track_type,
                    found: rep.track_type(),
                });
            }
            if !seen.insert(&rep.format_id) {
                return Err(ManifestError::DuplicateFormat(rep.format_id.clone()));
            }
        }

        Ok(Self {
            track_type,
            representations,
        })
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    pub fn get(&self, index: usize) -> Option<&Representation> {
        self.representations.get(index)
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    pub fn position(&self, format_id: &FormatId) -> Option<usize> {
        self.representations
            .iter()
            .position(|r| &r.format_id == format_id)
    }
}

/// Everything needed to open a session and choose tracks for one playback.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub video_id: String,
    /// Server ABR streaming endpoint.
    pub session_uri: Url,
    /// Opaque per-session configuration, passed to the session unmodified.
    pub ustreamer_config: Bytes,
    /// Optional proof-of-origin token.
    pub po_token: Option<Bytes>,
    pub duration: Duration,
    pub adaptation_sets: Vec<AdaptationSet>,
}

impl Manifest {
    #[expect(clippy::cast_possible_truncation)] // microseconds fit u64 for any real media duration
    pub fn duration_us(&self) -> u64 {
        self.duration.as_micros() as u64
    }

    pub fn adaptation_set(&self, index: usize) -> Option<&AdaptationSet> {
        self.adaptation_sets.get(index)
    }

    pub fn representation(&self, set: usize, rep: usize) -> Option<&Representation> {
        self.adaptation_set(set).and_then(|s| s.get(rep))
    }

    /// Indices of adaptation sets carrying `track_type`, in manifest order.
    pub fn sets_of(&self, track_type: TrackType) -> impl Iterator<Item = usize> + '_ {
        self.adaptation_sets
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.track_type() == track_type)
            .map(|(i, _)| i)
    }
}
