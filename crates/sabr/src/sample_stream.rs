use std::{collections::VecDeque, time::Duration};

use bytes::Bytes;
use sabr_abr::AbrOptions;
use sabr_events::{EventBus, SabrEvent};
use sabr_manifest::{FormatId, TrackType};
use sabr_stream::{
    NativeDemux, Segment, SegmentKind, SegmentReader, SessionDriver, SessionError,
};
use web_time::Instant;

use crate::{
    ChunkRequest, ChunkSource, LoadErrorAction, LoadingInfo, MediaChunk, SabrError, SabrResult,
    SequenceableLoader,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    /// Container header for a format; precedes its media samples.
    Init,
    Media,
}

/// One unit handed to the playback pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub kind: SampleKind,
    pub format: FormatId,
    pub data: Bytes,
    pub time_us: u64,
    pub duration_us: u64,
    pub sequence_number: u64,
}

impl Sample {
    pub fn end_time_us(&self) -> u64 {
        self.time_us + self.duration_us
    }

    fn is_media(&self) -> bool {
        self.kind == SampleKind::Media
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadResult {
    Sample(Sample),
    NothingRead,
    EndOfStream,
}

/// Outcome of pulling segments for one request.
enum Extracted {
    Init(Segment),
    Media(Segment),
    EndOfInput,
}

/// Pulls segments for one track, filtering what a request does not want.
///
/// Segments of other formats are stale leftovers from before a format switch.
/// Media segments below the wanted number are stale after a seek.
struct ChunkExtractor<D: NativeDemux> {
    reader: SegmentReader<D>,
    /// Read ahead of an init request; consumed first by the next request.
    stash: VecDeque<Segment>,
}

impl<D: NativeDemux> ChunkExtractor<D> {
    fn new(reader: SegmentReader<D>) -> Self {
        Self {
            reader,
            stash: VecDeque::new(),
        }
    }

    fn next(&mut self) -> SabrResult<Option<Segment>> {
        if let Some(segment) = self.stash.pop_front() {
            return Ok(Some(segment));
        }
        Ok(self.reader.next_segment()?)
    }

    fn init_for(&mut self, format: &FormatId) -> SabrResult<Extracted> {
        let mut held = Vec::new();
        let result = loop {
            let Some(segment) = self.next()? else {
                break Extracted::EndOfInput;
            };
            if segment.format != *format {
                tracing::trace!(format = %segment.format, "dropping segment of other format");
                continue;
            }
            if segment.is_init() {
                break Extracted::Init(segment);
            }
            held.push(segment);
        };
        self.stash.extend(held);
        Ok(result)
    }

    /// Next media segment numbered at or after `wanted`. Init segments for
    /// the format are returned as they pass.
    fn media_for(&mut self, format: &FormatId, wanted: u64) -> SabrResult<Extracted> {
        loop {
            let Some(segment) = self.next()? else {
                return Ok(Extracted::EndOfInput);
            };
            if segment.format != *format {
                tracing::trace!(format = %segment.format, "dropping segment of other format");
                continue;
            }
            if segment.is_init() {
                return Ok(Extracted::Init(segment));
            }
            if segment.sequence_number < wanted {
                tracing::trace!(segment = segment.sequence_number, wanted, "stale segment");
                continue;
            }
            return Ok(Extracted::Media(segment));
        }
    }

    fn clear(&mut self) {
        self.stash.clear();
    }
}

/// Chunk-consuming sample stream for one selected track.
///
/// Loading resolves [`ChunkRequest`]s against the native session; reading
/// hands loaded samples to the playback pipeline in order.
pub struct ChunkSampleStream<D: NativeDemux> {
    track: TrackType,
    source: ChunkSource,
    driver: SessionDriver<D>,
    extractor: Option<ChunkExtractor<D>>,
    events: EventBus,
    samples: VecDeque<Sample>,
    /// Last loaded media chunk; drives the next segment number.
    previous: Option<MediaChunk>,
    /// Where loading resumes when there is no previous chunk.
    pending_load_us: u64,
    /// Format the session currently delivers for this track.
    current_format: Option<FormatId>,
    duration_us: u64,
    error_count: u32,
    loading_finished: bool,
}

impl<D: NativeDemux> ChunkSampleStream<D> {
    pub fn new(
        source: ChunkSource,
        driver: SessionDriver<D>,
        session_format: Option<FormatId>,
        position_us: u64,
        duration_us: u64,
        events: EventBus,
    ) -> Self {
        let track = source.track();
        let reader = driver.reader(track);
        Self {
            track,
            source,
            driver,
            extractor: Some(ChunkExtractor::new(reader)),
            events,
            samples: VecDeque::new(),
            previous: None,
            pending_load_us: position_us,
            current_format: session_format,
            duration_us,
            error_count: 0,
            loading_finished: false,
        }
    }

    pub fn track(&self) -> TrackType {
        self.track
    }

    pub fn chunk_source(&self) -> &ChunkSource {
        &self.source
    }

    pub fn is_released(&self) -> bool {
        self.extractor.is_none()
    }

    pub fn read_sample(&mut self) -> ReadResult {
        match self.samples.pop_front() {
            Some(sample) => ReadResult::Sample(sample),
            None if self.loading_finished => ReadResult::EndOfStream,
            None => ReadResult::NothingRead,
        }
    }

    /// Drops buffered media samples that end at or before `position_us`.
    pub fn discard_buffer(&mut self, position_us: u64) {
        let before = self.samples.len();
        self.samples
            .retain(|s| !s.is_media() || s.end_time_us() > position_us);
        let dropped = before - self.samples.len();
        if dropped > 0 {
            tracing::trace!(track = %self.track, dropped, position_us, "discarded buffer");
        }
    }

    /// Seeks within the buffer when possible. Returns `true` for an
    /// in-buffer seek; otherwise the buffer is cleared and loading restarts
    /// at `position_us`.
    pub fn seek_to_us(&mut self, position_us: u64) -> bool {
        let first = self.samples.iter().find(|s| s.is_media()).map(|s| s.time_us);
        let last = self.samples.iter().rev().find(|s| s.is_media()).map(Sample::end_time_us);

        if let (Some(first), Some(last)) = (first, last)
            && first <= position_us
            && position_us < last
        {
            self.discard_buffer(position_us);
            tracing::debug!(track = %self.track, position_us, "seek within buffer");
            return true;
        }

        self.samples.clear();
        if let Some(extractor) = &mut self.extractor {
            extractor.clear();
        }
        self.previous = None;
        self.pending_load_us = position_us;
        self.loading_finished = false;
        self.source.reset_buffer();
        tracing::debug!(track = %self.track, position_us, "seek outside buffer");
        false
    }

    pub fn is_ready(&self) -> bool {
        !self.samples.is_empty() || self.loading_finished
    }

    pub fn is_ended(&self) -> bool {
        self.loading_finished && self.samples.is_empty()
    }

    /// Pushes new selection settings into the chunk source without touching
    /// buffered samples.
    pub fn update_selection(&mut self, abr: AbrOptions, now: Instant) {
        self.source.update_track_selection(abr, now);
    }

    pub fn maybe_throw_error(&self) -> SabrResult<()> {
        self.source.maybe_throw_error()
    }

    /// Stops delivery for this track and drops everything buffered.
    pub fn release(&mut self) {
        if let Some(extractor) = self.extractor.take() {
            extractor.reader.release();
            self.samples.clear();
            tracing::debug!(track = %self.track, "sample stream released");
        }
    }

    fn load_next(&mut self, info: &LoadingInfo) -> SabrResult<bool> {
        let now = info.now;
        let request = self.source.get_next_chunk(
            info.playback_position_us,
            self.pending_load_us,
            self.previous.as_ref(),
            now,
        )?;
        match request {
            ChunkRequest::EndOfStream(reason) => {
                tracing::debug!(track = %self.track, ?reason, "loading finished");
                self.finish();
                Ok(false)
            }
            ChunkRequest::Initialization {
                representation,
                format,
            } => {
                let loaded = self
                    .ensure_format(representation, &format)
                    .and_then(|()| self.load_initialization(&format));
                match loaded {
                    Err(SabrError::Session(error)) => {
                        self.on_load_error(representation, None, &error, now)
                    }
                    other => other,
                }
            }
            ChunkRequest::Media(chunk) => {
                if let Err(error) = self.ensure_format(chunk.representation, &chunk.format) {
                    return match error {
                        SabrError::Session(error) => {
                            self.on_load_error(chunk.representation, Some(&chunk), &error, now)
                        }
                        other => Err(other),
                    };
                }
                self.load_media(chunk, now)
            }
        }
    }

    fn ensure_format(&mut self, representation: usize, format: &FormatId) -> SabrResult<()> {
        if self.current_format.as_ref() == Some(format) {
            return Ok(());
        }
        let Some(rep) = self
            .source
            .holder(representation)
            .map(|h| h.representation().clone())
        else {
            return Ok(());
        };
        tracing::debug!(track = %self.track, %format, "switching session format");
        self.driver.select_format(&rep)?;
        self.current_format = Some(format.clone());
        Ok(())
    }

    fn load_initialization(&mut self, format: &FormatId) -> SabrResult<bool> {
        let Some(extractor) = &mut self.extractor else {
            return Ok(false);
        };
        match extractor.init_for(format)? {
            Extracted::Init(segment) => {
                self.accept_init(segment);
                Ok(true)
            }
            Extracted::Media(_) | Extracted::EndOfInput => {
                tracing::debug!(track = %self.track, %format, "session ended before init");
                self.finish();
                Ok(false)
            }
        }
    }

    fn accept_init(&mut self, segment: Segment) {
        let data = segment.to_bytes();
        if let SegmentKind::Init(index) = segment.kind {
            self.source.on_initialization(&segment.format, index);
        }
        self.error_count = 0;
        self.samples.push_back(Sample {
            kind: SampleKind::Init,
            format: segment.format,
            data,
            time_us: self.pending_load_us,
            duration_us: 0,
            sequence_number: 0,
        });
    }

    fn load_media(&mut self, chunk: MediaChunk, now: Instant) -> SabrResult<bool> {
        let started = Instant::now();
        loop {
            let Some(extractor) = &mut self.extractor else {
                return Ok(false);
            };
            let extracted = match extractor.media_for(&chunk.format, chunk.segment_number) {
                Ok(extracted) => extracted,
                Err(SabrError::Session(error)) => {
                    return self.on_load_error(chunk.representation, Some(&chunk), &error, now);
                }
                Err(other) => return Err(other),
            };
            match extracted {
                Extracted::Init(segment) => self.accept_init(segment),
                Extracted::EndOfInput => {
                    tracing::debug!(track = %self.track, "session ended");
                    self.finish();
                    return Ok(false);
                }
                Extracted::Media(segment) => {
                    self.accept_media(chunk, segment, started.elapsed(), now);
                    return Ok(true);
                }
            }
        }
    }

    fn accept_media(
        &mut self,
        requested: MediaChunk,
        segment: Segment,
        elapsed: Duration,
        now: Instant,
    ) {
        let chunk = if segment.sequence_number == requested.segment_number {
            requested
        } else {
            tracing::debug!(
                track = %self.track,
                requested = requested.segment_number,
                segment = segment.sequence_number,
                "realigning to delivered segment"
            );
            self.realigned(requested, segment.sequence_number)
        };

        let data = segment.to_bytes();
        let bytes = data.len() as u64;
        self.source.on_chunk_load_completed(&chunk, bytes, elapsed, now);
        self.error_count = 0;
        self.samples.push_back(Sample {
            kind: SampleKind::Media,
            format: segment.format,
            data,
            time_us: chunk.start_time_us,
            duration_us: chunk.duration_us(),
            sequence_number: chunk.segment_number,
        });
        self.previous = Some(chunk);
    }

    fn realigned(&self, requested: MediaChunk, segment_number: u64) -> MediaChunk {
        let holder = self.source.holder(requested.representation);
        let start = holder.and_then(|h| h.segment_start_time_us(segment_number));
        let end = holder.and_then(|h| h.segment_end_time_us(segment_number));
        MediaChunk {
            segment_number,
            start_time_us: start.unwrap_or(requested.end_time_us),
            end_time_us: end.unwrap_or(requested.end_time_us),
            ..requested
        }
    }

    /// Hands a failed load to the chunk source. `failed` is `None` for an
    /// initialization chunk. Cancellation bypasses the fallback policy.
    fn on_load_error(
        &mut self,
        representation: usize,
        failed: Option<&MediaChunk>,
        error: &SessionError,
        now: Instant,
    ) -> SabrResult<bool> {
        if matches!(error, SessionError::Cancelled) {
            return Err(SessionError::Cancelled.into());
        }
        self.error_count += 1;
        let segment_number = failed.map(|c| c.segment_number);
        tracing::warn!(
            track = %self.track,
            representation,
            segment = ?segment_number,
            %error,
            "chunk load failed"
        );
        let action = self.source.on_chunk_load_error(
            representation,
            segment_number,
            error,
            self.error_count,
            now,
        );
        match action {
            LoadErrorAction::EndOfStream => {
                self.finish();
                Ok(false)
            }
            LoadErrorAction::Excluded { .. } => {
                // A failed media chunk is requested again from its start. A
                // failed init keeps the load position.
                if let Some(chunk) = failed {
                    self.pending_load_us = chunk.start_time_us;
                    self.previous = None;
                }
                Ok(true)
            }
            LoadErrorAction::Fatal(err) => Err(err),
        }
    }

    fn finish(&mut self) {
        if !self.loading_finished {
            self.loading_finished = true;
            self.events
                .publish(SabrEvent::EndOfStream { track: self.track });
        }
    }

    fn loaded_until_us(&self) -> u64 {
        self.previous
            .as_ref()
            .map_or(self.pending_load_us, |c| c.end_time_us)
    }
}

impl<D: NativeDemux> SequenceableLoader for ChunkSampleStream<D> {
    fn next_load_position_us(&self) -> Option<u64> {
        (!self.loading_finished && !self.is_released()).then(|| self.loaded_until_us())
    }

    fn buffered_position_us(&self) -> Option<u64> {
        if self.loading_finished {
            return None;
        }
        let buffered = self
            .samples
            .iter()
            .rev()
            .find(|s| s.is_media())
            .map(Sample::end_time_us);
        Some(buffered.unwrap_or_else(|| self.loaded_until_us()))
    }

    fn is_loading(&self) -> bool {
        !self.loading_finished && !self.is_released()
    }

    fn continue_loading(&mut self, info: &LoadingInfo) -> SabrResult<bool> {
        if self.loading_finished || self.is_released() {
            return Ok(false);
        }
        self.load_next(info)
    }

    /// Drops samples past the presentation end. Only applies while the
    /// stream is not loading.
    fn reevaluate_buffer(&mut self, _position_us: u64) {
        if self.is_loading() || self.duration_us == 0 {
            return;
        }
        let duration_us = self.duration_us;
        self.samples
            .retain(|s| !s.is_media() || s.time_us < duration_us);
    }
}

impl<D: NativeDemux> Drop for ChunkSampleStream<D> {
    fn drop(&mut self) {
        self.release();
    }
}
