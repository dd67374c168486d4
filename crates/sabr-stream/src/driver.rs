use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use sabr_events::{EventBus, SabrEvent};
use sabr_manifest::{FormatId, Representation, TrackType};
use tokio_util::sync::CancellationToken;

use crate::{
    NativeDemux, PollBatch, RetryPolicy, Segment, SegmentQueue, SessionError, SessionResult,
    StreamSession,
};

/// Longest stretch a retry backoff sleeps before checking for cancellation.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug, Default)]
pub struct DriverOptions {
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
    pub events: EventBus,
}

struct DriverState<D: NativeDemux> {
    session: StreamSession<D>,
    /// The session returned an empty batch.
    finished: bool,
    /// Non-resumable failure, returned to every later read.
    failure: Option<SessionError>,
    last_delivered: HashMap<FormatId, u64>,
    released: HashSet<TrackType>,
}

struct Shared<D: NativeDemux> {
    state: Mutex<DriverState<D>>,
    audio: SegmentQueue,
    video: SegmentQueue,
    retry: RetryPolicy,
    cancel: CancellationToken,
    events: EventBus,
    polls: AtomicU64,
}

impl<D: NativeDemux> Shared<D> {
    fn queue(&self, track: TrackType) -> &SegmentQueue {
        match track {
            TrackType::Audio => &self.audio,
            TrackType::Video => &self.video,
        }
    }

    fn poll_with_retry(&self, state: &mut DriverState<D>) -> SessionResult<PollBatch> {
        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            self.polls.fetch_add(1, Ordering::Relaxed);

            let error = match state.session.poll() {
                Ok(batch) => return Ok(batch),
                Err(SessionError::Demux(error)) => error,
                Err(other) => return Err(other),
            };

            if self.retry.should_retry(&error, attempt) {
                attempt += 1;
                let delay = self.retry.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, %error, "poll failed, retrying");
                if !backoff(&self.cancel, delay) {
                    tracing::debug!(attempt, "retry backoff cancelled");
                    return Err(SessionError::Cancelled);
                }
                continue;
            }

            if error.is_retryable() {
                return Err(SessionError::RetryExhausted {
                    attempts: attempt + 1,
                    source: error,
                });
            }

            let err = SessionError::Demux(error);
            if err.is_fatal() {
                tracing::error!(error = %err, "session failed");
                state.failure = Some(err.clone());
                self.events.publish(SabrEvent::Error {
                    error: err.to_string(),
                    recoverable: false,
                });
            }
            return Err(err);
        }
    }

    fn dispatch(&self, state: &mut DriverState<D>, batch: PollBatch) -> SessionResult<()> {
        self.events.publish(SabrEvent::SegmentsPolled {
            audio: batch.audio.len(),
            video: batch.video.len(),
        });
        tracing::trace!(
            audio = batch.audio.len(),
            video = batch.video.len(),
            "poll batch"
        );

        for (track, segments) in [
            (TrackType::Audio, batch.audio),
            (TrackType::Video, batch.video),
        ] {
            if state.released.contains(&track) {
                tracing::trace!(%track, dropped = segments.len(), "track released, dropping");
                continue;
            }
            let fresh: Vec<Segment> = segments
                .into_iter()
                .filter(|s| accept(&mut state.last_delivered, s))
                .collect();
            self.queue(track).push_batch(fresh)?;
        }
        Ok(())
    }
}

/// Sleeps for `delay` in short slices. Returns `false` as soon as `cancel`
/// fires.
fn backoff(cancel: &CancellationToken, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(CANCEL_CHECK_INTERVAL));
    }
}

/// Drops media segments already delivered for their format.
fn accept(last_delivered: &mut HashMap<FormatId, u64>, segment: &Segment) -> bool {
    if segment.is_init() {
        return true;
    }
    match last_delivered.get(&segment.format) {
        Some(&last) if segment.sequence_number <= last => {
            tracing::debug!(
                format = %segment.format,
                segment = segment.sequence_number,
                last,
                "duplicate segment dropped"
            );
            return false;
        }
        Some(&last) if segment.sequence_number > last + 1 => {
            tracing::warn!(
                format = %segment.format,
                segment = segment.sequence_number,
                last,
                "segment gap"
            );
        }
        _ => {}
    }
    last_delivered.insert(segment.format.clone(), segment.sequence_number);
    true
}

/// Single-writer owner of a [`StreamSession`].
///
/// Readers poll on demand: a read that finds its own queue empty takes the
/// session lock and polls until a segment for its track arrives, pushing
/// everything else to the other track's queue.
pub struct SessionDriver<D: NativeDemux> {
    shared: Arc<Shared<D>>,
}

impl<D: NativeDemux> Clone for SessionDriver<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: NativeDemux> SessionDriver<D> {
    pub fn new(session: StreamSession<D>, options: DriverOptions) -> Self {
        let state = DriverState {
            session,
            finished: false,
            failure: None,
            last_delivered: HashMap::new(),
            released: HashSet::new(),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                audio: SegmentQueue::new(TrackType::Audio),
                video: SegmentQueue::new(TrackType::Video),
                retry: options.retry,
                cancel: options.cancel,
                events: options.events,
                polls: AtomicU64::new(0),
            }),
        }
    }

    /// Consumer for `track`. Re-opens a previously released track.
    pub fn reader(&self, track: TrackType) -> SegmentReader<D> {
        self.shared.state.lock().released.remove(&track);
        SegmentReader {
            shared: Arc::clone(&self.shared),
            track,
            released: false,
        }
    }

    pub fn select_format(&self, representation: &Representation) -> SessionResult<()> {
        let mut state = self.shared.state.lock();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        state.session.select_format(representation)?;
        // The session restarts the track with an init segment.
        state.finished = false;
        Ok(())
    }

    /// Destroys the native session. Fails on the second call.
    pub fn destroy(&self) -> SessionResult<()> {
        let mut state = self.shared.state.lock();
        let dropped = self.shared.audio.drain() + self.shared.video.drain();
        state.session.destroy()?;
        state.finished = true;
        tracing::debug!(dropped, "session driver destroyed");
        self.shared.events.publish(SabrEvent::SessionDestroyed);
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().session.is_closed()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

    /// Retained fatal failure, if any.
    pub fn failure(&self) -> Option<SessionError> {
        self.shared.state.lock().failure.clone()
    }

    /// Number of `poll` calls made on the session, retries included.
    pub fn poll_count(&self) -> u64 {
        self.shared.polls.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }
}

/// Consumer end for one track.
///
/// Dropping or releasing the reader drains its queue and stops delivery to
/// the track.
pub struct SegmentReader<D: NativeDemux> {
    shared: Arc<Shared<D>>,
    track: TrackType,
    released: bool,
}

impl<D: NativeDemux> SegmentReader<D> {
    pub fn track(&self) -> TrackType {
        self.track
    }

    /// Segments already queued for this track.
    pub fn pending(&self) -> usize {
        self.shared.queue(self.track).len()
    }

    /// Next segment for this track, polling the session when the queue is
    /// empty. `Ok(None)` means end of stream.
    pub fn next_segment(&self) -> SessionResult<Option<Segment>> {
        let queue = self.shared.queue(self.track);
        loop {
            if let Some(segment) = queue.try_pop() {
                return Ok(Some(segment));
            }

            let mut state = self.shared.state.lock();
            // Another reader may have polled while this one waited.
            if let Some(segment) = queue.try_pop() {
                return Ok(Some(segment));
            }
            if let Some(err) = &state.failure {
                return Err(err.clone());
            }
            if state.session.is_closed() {
                return Err(SessionError::Destroyed);
            }
            if state.finished {
                return Ok(None);
            }

            let batch = self.shared.poll_with_retry(&mut state)?;
            if batch.is_empty() {
                tracing::debug!(track = %self.track, "session reported end of stream");
                state.finished = true;
                return Ok(None);
            }
            self.shared.dispatch(&mut state, batch)?;
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = self.shared.state.lock();
        state.released.insert(self.track);
        let dropped = self.shared.queue(self.track).drain();
        tracing::debug!(track = %self.track, dropped, "segment reader released");
    }
}

impl<D: NativeDemux> Drop for SegmentReader<D> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
