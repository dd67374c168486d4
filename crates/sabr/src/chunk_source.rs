//! Per-track decision of what to load next.
//!
//! A [`ChunkSource`] owns the representation holders of one adaptation set
//! and its [`TrackSelection`]. It never performs I/O: bytes for a request are
//! resolved by the native session, and results are reported back through
//! `on_initialization`, `on_chunk_load_completed` and `on_chunk_load_error`.

use std::{sync::Arc, time::Duration};

use sabr_abr::{
    AbrOptions, AbrReason, FallbackDecision, FallbackPolicy, LoadErrorInfo, LoadErrorStatus,
    ThroughputSample, ThroughputSampleSource, TrackSelection,
};
use sabr_events::{EventBus, SabrEvent};
use sabr_manifest::{AdaptationSet, FormatId, Representation, TrackType};
use sabr_stream::{ChunkIndex, DemuxError, SessionError};
use web_time::Instant;

use crate::{RepresentationHolder, SabrError, SabrResult, SeekParameters};

/// A media chunk addressed by format and segment number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaChunk {
    pub representation: usize,
    pub format: FormatId,
    pub segment_number: u64,
    pub start_time_us: u64,
    pub end_time_us: u64,
}

impl MediaChunk {
    pub fn next_segment_number(&self) -> u64 {
        self.segment_number + 1
    }

    pub fn duration_us(&self) -> u64 {
        self.end_time_us.saturating_sub(self.start_time_us)
    }
}

/// Why a track has nothing more to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The representation's index has no segments.
    EmptyIndex,
    /// Candidate segment is past the last one in the index.
    BeyondIndex,
    /// The server reported the last segment missing.
    MissingLastSegment,
    /// Candidate segment starts at or after the presentation duration.
    DurationClipped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkRequest {
    /// Load the init chunk (and thereby the index) of a representation.
    Initialization {
        representation: usize,
        format: FormatId,
    },
    Media(MediaChunk),
    EndOfStream(EndReason),
}

/// Outcome of a failed load after classification and fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadErrorAction {
    /// Not-found at the last boundary: treat as end of stream.
    EndOfStream,
    /// Representation excluded; the next request selects another.
    Excluded { representation: usize, duration: Duration },
    Fatal(SabrError),
}

pub struct ChunkSource {
    track: TrackType,
    holders: Vec<RepresentationHolder>,
    selection: TrackSelection,
    fallback: Arc<dyn FallbackPolicy>,
    duration_us: u64,
    missing_last_segment: bool,
    fatal_error: Option<SabrError>,
    events: EventBus,
}

impl ChunkSource {
    pub fn new(
        set: &AdaptationSet,
        duration_us: u64,
        abr: AbrOptions,
        fallback: Arc<dyn FallbackPolicy>,
        events: EventBus,
    ) -> Self {
        let holders: Vec<_> = set
            .representations()
            .iter()
            .cloned()
            .map(RepresentationHolder::new)
            .collect();
        let bandwidths: Vec<u64> = set.representations().iter().map(|r| r.bitrate).collect();
        Self {
            track: set.track_type(),
            holders,
            selection: TrackSelection::new(&bandwidths, abr),
            fallback,
            duration_us,
            missing_last_segment: false,
            fatal_error: None,
            events,
        }
    }

    pub fn track(&self) -> TrackType {
        self.track
    }

    pub fn selected_index(&self) -> usize {
        self.selection.selected_index()
    }

    pub fn selected_representation(&self) -> Option<&Representation> {
        self.holder(self.selected_index())
            .map(RepresentationHolder::representation)
    }

    pub fn holder(&self, representation: usize) -> Option<&RepresentationHolder> {
        self.holders.get(representation)
    }

    pub fn selection(&self) -> &TrackSelection {
        &self.selection
    }

    pub fn is_missing_last_segment(&self) -> bool {
        self.missing_last_segment
    }

    /// Decides the next load for the selected representation.
    ///
    /// `previous` is the last completed media chunk; its successor is the
    /// candidate. Without one, the candidate is the segment containing
    /// `load_position_us`. The selection sees everything loaded past
    /// `playback_position_us` as buffer.
    pub fn get_next_chunk(
        &mut self,
        playback_position_us: u64,
        load_position_us: u64,
        previous: Option<&MediaChunk>,
        now: Instant,
    ) -> SabrResult<ChunkRequest> {
        self.maybe_throw_error()?;

        let loaded_until_us = previous.map_or(load_position_us, |c| c.end_time_us);
        self.selection.set_buffered_duration(Duration::from_micros(
            loaded_until_us.saturating_sub(playback_position_us),
        ));

        let from = self.selection.selected_index();
        let decision = self.selection.update_selected_track(now);
        if decision.reason == AbrReason::NoCandidate {
            return Err(self.fail(
                decision.target_variant_index,
                None,
                SessionError::Demux(DemuxError::Protocol("no live representation".into())),
            ));
        }
        if decision.changed {
            self.events.publish(SabrEvent::RepresentationSelected {
                track: self.track,
                from,
                to: decision.target_variant_index,
                reason: decision.reason,
            });
        }

        let representation = decision.target_variant_index;
        let Some(holder) = self.holders.get(representation) else {
            return Err(SabrError::InvalidSelection(format!(
                "{} representation {representation} out of range",
                self.track
            )));
        };

        if !holder.has_index() {
            return Ok(ChunkRequest::Initialization {
                representation,
                format: holder.format_id().clone(),
            });
        }

        let candidate = previous.map_or_else(
            || holder.segment_number_for(load_position_us),
            MediaChunk::next_segment_number,
        );

        if let Some(reason) = self.end_reason(holder, candidate) {
            tracing::debug!(track = %self.track, candidate, ?reason, "end of stream");
            return Ok(ChunkRequest::EndOfStream(reason));
        }

        let (Some(start_time_us), Some(end_time_us)) = (
            holder.segment_start_time_us(candidate),
            holder.segment_end_time_us(candidate),
        ) else {
            return Ok(ChunkRequest::EndOfStream(EndReason::BeyondIndex));
        };

        Ok(ChunkRequest::Media(MediaChunk {
            representation,
            format: holder.format_id().clone(),
            segment_number: candidate,
            start_time_us,
            end_time_us,
        }))
    }

    /// Single boundary check for every benign end-of-stream condition.
    ///
    /// Precedence when several hold: `EmptyIndex`, then
    /// `MissingLastSegment`, then `BeyondIndex`, then `DurationClipped`.
    /// The missing-last-segment flag is the server-confirmed boundary, so it
    /// wins over plain index arithmetic.
    fn end_reason(&self, holder: &RepresentationHolder, candidate: u64) -> Option<EndReason> {
        let Some(last) = holder.last_available_segment_number() else {
            return Some(EndReason::EmptyIndex);
        };
        if self.missing_last_segment && candidate >= last {
            return Some(EndReason::MissingLastSegment);
        }
        if candidate > last {
            return Some(EndReason::BeyondIndex);
        }
        let clipped = self.duration_us > 0
            && holder
                .segment_start_time_us(candidate)
                .is_some_and(|start| start >= self.duration_us);
        clipped.then_some(EndReason::DurationClipped)
    }

    /// Snaps `position_us` to a segment boundary of any indexed representation.
    pub fn adjusted_seek_position_us(&self, position_us: u64, params: SeekParameters) -> u64 {
        let Some(index) = self.holders.iter().find_map(|h| {
            h.index().filter(|i| !i.is_empty())
        }) else {
            return position_us;
        };
        resolve_seek(index, position_us, params)
    }

    /// Records the index delivered by an init chunk. Returns `false` for
    /// unknown formats or an already populated index.
    pub fn on_initialization(&mut self, format: &FormatId, index: ChunkIndex) -> bool {
        match self.holders.iter_mut().find(|h| h.format_id() == format) {
            Some(holder) => holder.set_index(index),
            None => {
                tracing::warn!(track = %self.track, %format, "init for unknown format");
                false
            }
        }
    }

    pub fn on_chunk_load_completed(
        &mut self,
        chunk: &MediaChunk,
        bytes: u64,
        elapsed: Duration,
        now: Instant,
    ) {
        self.selection.push_throughput_sample(ThroughputSample {
            bytes,
            duration: elapsed,
            at: now,
            source: ThroughputSampleSource::Network,
            content_duration: Some(Duration::from_micros(chunk.duration_us())),
        });
        self.events.publish(SabrEvent::ChunkLoaded {
            track: self.track,
            segment: chunk.segment_number,
            bytes,
            elapsed,
        });
    }

    /// Classifies a failed load and applies the fallback policy.
    pub fn on_chunk_load_error(
        &mut self,
        representation: usize,
        segment_number: Option<u64>,
        error: &SessionError,
        error_count: u32,
        now: Instant,
    ) -> LoadErrorAction {
        if let Some(err) = &self.fatal_error {
            return LoadErrorAction::Fatal(err.clone());
        }

        let status = classify(error);
        if status == LoadErrorStatus::NotFound
            && let (Some(n), Some(last)) = (
                segment_number,
                self.holders
                    .get(representation)
                    .and_then(RepresentationHolder::last_available_segment_number),
            )
            && n >= last
        {
            tracing::debug!(track = %self.track, segment = n, "last segment missing");
            self.missing_last_segment = true;
            return LoadErrorAction::EndOfStream;
        }

        if error.is_fatal() {
            return LoadErrorAction::Fatal(self.fail(representation, segment_number, error.clone()));
        }

        let options = self.selection.fallback_options(now);
        let info = LoadErrorInfo {
            representation,
            segment_number,
            status,
            cancelable: error.is_cancelable(),
            error_count,
        };
        match self.fallback.fallback_for(&options, &info) {
            FallbackDecision::ExcludeTrack(duration)
                if self.selection.exclude(representation, duration, now) =>
            {
                tracing::warn!(
                    track = %self.track,
                    representation,
                    ?status,
                    ?duration,
                    "representation excluded"
                );
                self.events.publish(SabrEvent::RepresentationExcluded {
                    track: self.track,
                    representation,
                    duration,
                });
                self.events.publish(SabrEvent::Error {
                    error: error.to_string(),
                    recoverable: true,
                });
                LoadErrorAction::Excluded {
                    representation,
                    duration,
                }
            }
            _ => LoadErrorAction::Fatal(self.fail(representation, segment_number, error.clone())),
        }
    }

    fn fail(&mut self, representation: usize, segment: Option<u64>, source: SessionError) -> SabrError {
        let err = SabrError::LoadFailed {
            track: self.track,
            representation,
            segment,
            source,
        };
        tracing::error!(error = %err, "chunk source failed");
        self.events.publish(SabrEvent::Error {
            error: err.to_string(),
            recoverable: false,
        });
        self.fatal_error = Some(err.clone());
        err
    }

    /// Re-raises a retained fatal error.
    pub fn maybe_throw_error(&self) -> SabrResult<()> {
        match &self.fatal_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Replaces the selection settings, keeping holders, indexes and
    /// exclusions.
    pub fn update_track_selection(&mut self, abr: AbrOptions, now: Instant) {
        let bandwidths: Vec<u64> = self
            .holders
            .iter()
            .map(|h| h.representation().bitrate)
            .collect();
        let mut selection = TrackSelection::new(&bandwidths, abr);
        selection.inherit_exclusions(&self.selection);
        selection.update_selected_track(now);
        self.selection = selection;
    }

    pub fn reset_buffer(&mut self) {
        self.selection.reset_buffer();
    }
}

fn classify(error: &SessionError) -> LoadErrorStatus {
    match error.demux_error() {
        Some(DemuxError::Http { status: 404 }) => LoadErrorStatus::NotFound,
        Some(DemuxError::Http { status }) => LoadErrorStatus::Http(*status),
        Some(DemuxError::Timeout) => LoadErrorStatus::Timeout,
        Some(DemuxError::Parse(_) | DemuxError::Protocol(_)) => LoadErrorStatus::Parse,
        Some(DemuxError::Transient(_)) | None => LoadErrorStatus::Transient,
    }
}

fn resolve_seek(index: &ChunkIndex, position_us: u64, params: SeekParameters) -> u64 {
    let n = index.segment_number_for(position_us);
    let Some(first) = index.segment_start_time_us(n) else {
        return position_us;
    };
    let second = if first < position_us {
        index.segment_start_time_us(n + 1).unwrap_or(first)
    } else {
        first
    };
    params.resolve(position_us.max(first), first, second)
}
