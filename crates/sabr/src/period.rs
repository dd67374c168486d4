//! Media period: one playback of one manifest over one native session.

use std::sync::Arc;

use sabr_abr::{AbrMode, AbrOptions};
use sabr_events::{EventBus, SabrEvent};
use sabr_manifest::{FormatId, Manifest, TrackType};
use sabr_stream::{DriverOptions, NativeDemux, SessionDriver, SessionParams, StreamSession};
use web_time::Instant;

use crate::{
    ChunkSampleStream, ChunkSource, CompositeLoader, LoadingInfo, SabrConfig, SabrError,
    SabrResult, SeekParameters, SequenceableLoader, TrackGroup, build_track_groups,
};

/// Notifications from the period to the playback pipeline.
#[cfg_attr(test, unimock::unimock(api = PeriodCallbackMock))]
pub trait PeriodCallback: Send {
    fn on_prepared(&self);

    /// The period can make more loading progress.
    fn on_continue_loading_requested(&self);
}

/// Selected track group and how to choose among its representations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackSelectionSpec {
    pub group: usize,
    pub mode: AbrMode,
}

/// Identifies one representation of the manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    pub adaptation_set: usize,
    pub representation: usize,
}

pub struct MediaPeriod<D: NativeDemux> {
    manifest: Arc<Manifest>,
    config: SabrConfig,
    events: EventBus,
    groups: Vec<TrackGroup>,
    /// Taken when the session is created.
    demux: Option<D>,
    driver: Option<SessionDriver<D>>,
    /// Formats the session was opened with, indexed audio then video.
    session_formats: [Option<FormatId>; 2],
    streams: Vec<Option<ChunkSampleStream<D>>>,
    selections: Vec<Option<TrackSelectionSpec>>,
    callback: Option<Box<dyn PeriodCallback>>,
    composite: CompositeLoader,
    pending_discontinuity: Option<u64>,
    released: bool,
}

impl<D: NativeDemux> MediaPeriod<D> {
    pub fn new(manifest: Arc<Manifest>, demux: D, config: SabrConfig) -> Self {
        let groups = build_track_groups(&manifest);
        let events = config.event_bus();
        let composite = CompositeLoader::new(config.max_buffer_duration);
        Self {
            manifest,
            config,
            events,
            groups,
            demux: Some(demux),
            driver: None,
            session_formats: [None, None],
            streams: Vec::new(),
            selections: Vec::new(),
            callback: None,
            composite,
            pending_discontinuity: None,
            released: false,
        }
    }

    /// The manifest is already available, so preparation completes at once.
    pub fn prepare(&mut self, callback: Box<dyn PeriodCallback>, position_us: u64) {
        self.pending_discontinuity = Some(position_us);
        callback.on_prepared();
        self.callback = Some(callback);
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn track_groups(&self) -> &[TrackGroup] {
        &self.groups
    }

    /// Applies new selections, one slot per renderer.
    ///
    /// Streams whose selection is cleared, changed or not retainable are
    /// released; retained streams get updated settings and keep their
    /// buffer; newly selected groups get fresh streams. Returns one flag per
    /// slot, set where a new stream was created.
    pub fn select_tracks(
        &mut self,
        selections: &[Option<TrackSelectionSpec>],
        may_retain: &[bool],
        position_us: u64,
    ) -> SabrResult<Vec<bool>> {
        if self.released {
            return Err(SabrError::Released);
        }
        if self.callback.is_none() {
            return Err(SabrError::NotPrepared);
        }
        self.validate(selections)?;

        let now = Instant::now();
        self.streams.resize_with(selections.len().max(self.streams.len()), || None);
        self.selections.resize(self.streams.len(), None);

        for slot in 0..self.streams.len() {
            let new = selections.get(slot).copied().flatten();
            let old = self.selections[slot];
            let retain = may_retain.get(slot).copied().unwrap_or(false);
            let same_group = matches!((old, new), (Some(o), Some(n)) if o.group == n.group);

            if same_group && retain {
                if old != new
                    && let Some(spec) = new
                {
                    let abr = self.abr_options(spec.mode);
                    if let Some(stream) = self.streams[slot].as_mut() {
                        stream.update_selection(abr, now);
                    }
                }
            } else if let Some(mut stream) = self.streams[slot].take() {
                stream.release();
            }
            self.selections[slot] = new;
        }

        self.ensure_session()?;

        let mut reset = vec![false; selections.len()];
        for (slot, spec) in selections.iter().enumerate() {
            let Some(spec) = spec else { continue };
            if self.streams[slot].is_none() {
                self.streams[slot] = Some(self.create_stream(*spec, position_us)?);
                reset[slot] = true;
            }
        }
        Ok(reset)
    }

    fn validate(&self, selections: &[Option<TrackSelectionSpec>]) -> SabrResult<()> {
        let mut seen = Vec::new();
        for spec in selections.iter().flatten() {
            let Some(group) = self.groups.get(spec.group) else {
                return Err(SabrError::InvalidSelection(format!(
                    "unknown track group {}",
                    spec.group
                )));
            };
            if seen.contains(&group.track_type) {
                return Err(SabrError::InvalidSelection(format!(
                    "more than one {} selection",
                    group.track_type
                )));
            }
            if let AbrMode::Manual(i) | AbrMode::Auto(Some(i)) = spec.mode
                && i >= group.len()
            {
                return Err(SabrError::InvalidSelection(format!(
                    "representation {i} out of range for {}",
                    group.id
                )));
            }
            seen.push(group.track_type);
        }
        Ok(())
    }

    fn abr_options(&self, mode: AbrMode) -> AbrOptions {
        AbrOptions {
            mode,
            ..self.config.abr.clone()
        }
    }

    fn selected_format(&self, track: TrackType) -> Option<(usize, usize)> {
        self.selections.iter().flatten().find_map(|spec| {
            let group = self.groups.get(spec.group)?;
            (group.track_type == track).then(|| {
                let initial = match spec.mode {
                    AbrMode::Manual(i) | AbrMode::Auto(Some(i)) => i,
                    AbrMode::Auto(None) => 0,
                };
                (group.adaptation_set, initial)
            })
        })
    }

    /// Opens the native session on the first non-empty selection.
    fn ensure_session(&mut self) -> SabrResult<()> {
        if self.driver.is_some() || self.selections.iter().all(Option::is_none) {
            return Ok(());
        }
        let Some(demux) = self.demux.take() else {
            return Err(SabrError::Released);
        };

        let rep_for = |track| {
            self.selected_format(track)
                .and_then(|(set, rep)| self.manifest.representation(set, rep))
        };
        let audio = rep_for(TrackType::Audio);
        let video = rep_for(TrackType::Video);
        let params =
            SessionParams::from_manifest(&self.manifest, audio, video, self.config.request_timeout);

        let session = StreamSession::initialize(demux, &params)?;
        tracing::info!(
            session = session.session_id(),
            audio = ?params.audio,
            video = ?params.video,
            "session created"
        );
        self.events.publish(SabrEvent::SessionCreated {
            audio: params.audio.clone(),
            video: params.video.clone(),
        });
        self.driver = Some(SessionDriver::new(
            session,
            DriverOptions {
                retry: self.config.retry.clone(),
                cancel: self.config.cancel_token(),
                events: self.events.clone(),
            },
        ));
        self.session_formats = [params.audio, params.video];
        Ok(())
    }

    fn create_stream(
        &mut self,
        spec: TrackSelectionSpec,
        position_us: u64,
    ) -> SabrResult<ChunkSampleStream<D>> {
        let Some(driver) = self.driver.clone() else {
            return Err(SabrError::NotPrepared);
        };
        let Some(group) = self.groups.get(spec.group) else {
            return Err(SabrError::InvalidSelection(format!(
                "unknown track group {}",
                spec.group
            )));
        };
        let track = group.track_type;
        let Some(set) = self.manifest.adaptation_set(group.adaptation_set) else {
            return Err(SabrError::InvalidSelection(group.id.clone()));
        };
        tracing::debug!(group = %group.id, %track, "sample stream created");
        let source = ChunkSource::new(
            set,
            self.manifest.duration_us(),
            self.abr_options(spec.mode),
            self.config.fallback_policy(),
            self.events.clone(),
        );
        // The session delivers its initial format once; later streams on
        // the same track select explicitly.
        let session_format = self.take_session_format(track);
        Ok(ChunkSampleStream::new(
            source,
            driver,
            session_format,
            position_us,
            self.manifest.duration_us(),
            self.events.clone(),
        ))
    }

    fn take_session_format(&mut self, track: TrackType) -> Option<FormatId> {
        match track {
            TrackType::Audio => self.session_formats[0].take(),
            TrackType::Video => self.session_formats[1].take(),
        }
    }

    pub fn sample_stream(&mut self, slot: usize) -> Option<&mut ChunkSampleStream<D>> {
        self.streams.get_mut(slot).and_then(Option::as_mut)
    }

    fn loader_views(&self) -> Vec<&dyn SequenceableLoader> {
        self.streams
            .iter()
            .flatten()
            .map(|s| s as &dyn SequenceableLoader)
            .collect()
    }

    fn loaders(&mut self) -> Vec<&mut dyn SequenceableLoader> {
        self.streams
            .iter_mut()
            .flatten()
            .map(|s| s as &mut dyn SequenceableLoader)
            .collect()
    }

    pub fn discard_buffer(&mut self, position_us: u64) {
        for stream in self.streams.iter_mut().flatten() {
            stream.discard_buffer(position_us);
        }
    }

    pub fn reevaluate_buffer(&mut self, position_us: u64) {
        let composite = self.composite;
        composite.reevaluate_buffer(&mut self.loaders(), position_us);
    }

    /// Loads what the composite loader allows and asks the pipeline for
    /// another turn when progress was made.
    pub fn continue_loading(&mut self, info: &LoadingInfo) -> SabrResult<bool> {
        if self.released {
            return Ok(false);
        }
        let composite = self.composite;
        let progress = composite.continue_loading(&mut self.loaders(), info)?;
        if progress && let Some(callback) = &self.callback {
            callback.on_continue_loading_requested();
        }
        Ok(progress)
    }

    pub fn is_loading(&self) -> bool {
        self.composite.is_loading(&self.loader_views())
    }

    /// `None` once every stream has loaded to its end.
    pub fn next_load_position_us(&self) -> Option<u64> {
        self.composite.next_load_position_us(&self.loader_views())
    }

    /// `None` once every stream has loaded to its end.
    pub fn buffered_position_us(&self) -> Option<u64> {
        self.composite.buffered_position_us(&self.loader_views())
    }

    /// Seeks every active stream.
    pub fn seek_to_us(&mut self, position_us: u64) -> u64 {
        for stream in self.streams.iter_mut().flatten() {
            stream.seek_to_us(position_us);
        }
        tracing::debug!(position_us, "period seek");
        position_us
    }

    /// Snaps `position_us` with the video index when one is loaded, else
    /// with any active stream's index.
    pub fn adjusted_seek_position_us(
        &self,
        position_us: u64,
        params: Option<SeekParameters>,
    ) -> u64 {
        let params = params.unwrap_or(self.config.seek);
        let mut active: Vec<&ChunkSampleStream<D>> = self.streams.iter().flatten().collect();
        active.sort_by_key(|s| s.track() != TrackType::Video);
        active
            .iter()
            .map(|s| s.chunk_source())
            .find(|source| {
                source
                    .holder(source.selected_index())
                    .is_some_and(|h| h.has_index())
            })
            .map_or(position_us, |source| {
                source.adjusted_seek_position_us(position_us, params)
            })
    }

    /// Initial start position, reported once.
    pub fn read_discontinuity(&mut self) -> Option<u64> {
        self.pending_discontinuity.take()
    }

    pub fn maybe_throw_error(&self) -> SabrResult<()> {
        for stream in self.streams.iter().flatten() {
            stream.maybe_throw_error()?;
        }
        if let Some(err) = self.driver.as_ref().and_then(SessionDriver::failure) {
            return Err(err.into());
        }
        Ok(())
    }

    /// Representations reachable through `selections`.
    pub fn stream_keys(&self, selections: &[Option<TrackSelectionSpec>]) -> Vec<StreamKey> {
        let mut keys = Vec::new();
        for spec in selections.iter().flatten() {
            let Some(group) = self.groups.get(spec.group) else {
                continue;
            };
            let adaptation_set = group.adaptation_set;
            match spec.mode {
                AbrMode::Manual(representation) => keys.push(StreamKey {
                    adaptation_set,
                    representation,
                }),
                AbrMode::Auto(_) => keys.extend((0..group.len()).map(|representation| {
                    StreamKey {
                        adaptation_set,
                        representation,
                    }
                })),
            }
        }
        keys
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Cancels polling, releases every stream, then destroys the session.
    /// Idempotent.
    pub fn release(&mut self) -> SabrResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        // Cancel first so a reader sleeping in retry backoff gives up the
        // session lock.
        if let Some(driver) = &self.driver {
            driver.cancel();
        }
        for slot in &mut self.streams {
            if let Some(mut stream) = slot.take() {
                stream.release();
            }
        }
        self.callback = None;
        if let Some(driver) = self.driver.take() {
            driver.destroy()?;
        }
        tracing::debug!("media period released");
        Ok(())
    }
}

impl<D: NativeDemux> Drop for MediaPeriod<D> {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            tracing::warn!(%error, "media period release failed on drop");
        }
    }
}
