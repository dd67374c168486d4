use std::{sync::Arc, time::Duration};

use rstest::rstest;
use sabr::{AbrMode, AbrOptions, ChunkRequest, ChunkSource, EndReason, LoadErrorAction, MediaChunk};
use sabr_abr::{FallbackDecision, FallbackOptions, FallbackPolicy, LoadErrorInfo, LoadErrorStatus};
use sabr_events::{EventBus, SabrEvent};
use sabr_stream::{DemuxError, SessionError};
use sabr_test_utils::fixtures;
use web_time::Instant;

const SEC: u64 = 1_000_000;

/// Excludes for a fixed window whenever a candidate remains.
struct FixedExclusion(Duration);

impl FallbackPolicy for FixedExclusion {
    fn fallback_for(&self, options: &FallbackOptions, error: &LoadErrorInfo) -> FallbackDecision {
        assert_ne!(error.status, LoadErrorStatus::NotFound);
        if options.is_fallback_available() {
            FallbackDecision::ExcludeTrack(self.0)
        } else {
            FallbackDecision::NoFallback
        }
    }
}

fn indexed_source(rungs: usize, events: EventBus) -> ChunkSource {
    let manifest = fixtures::manifest_with_video_ladder(rungs);
    let mut source = ChunkSource::new(
        manifest.adaptation_set(0).unwrap(),
        manifest.duration_us(),
        AbrOptions {
            mode: AbrMode::Auto(Some(0)),
            ..AbrOptions::default()
        },
        Arc::new(FixedExclusion(Duration::from_millis(5000))),
        events,
    );
    for rep in manifest.adaptation_set(0).unwrap().representations() {
        source.on_initialization(&rep.format_id, fixtures::four_segment_index());
    }
    source
}

fn media(request: ChunkRequest) -> MediaChunk {
    match request {
        ChunkRequest::Media(chunk) => chunk,
        other => panic!("expected media chunk, got {other:?}"),
    }
}

#[test]
fn walks_every_segment_then_ends() {
    let mut source = indexed_source(1, EventBus::default());
    let now = Instant::now();

    let mut previous: Option<MediaChunk> = None;
    let mut numbers = Vec::new();
    loop {
        match source.get_next_chunk(0, 0, previous.as_ref(), now).unwrap() {
            ChunkRequest::Media(chunk) => {
                if let Some(prev) = &previous {
                    assert!(chunk.start_time_us >= prev.end_time_us);
                }
                numbers.push(chunk.segment_number);
                previous = Some(chunk);
            }
            ChunkRequest::EndOfStream(reason) => {
                assert_eq!(reason, EndReason::BeyondIndex);
                break;
            }
            ChunkRequest::Initialization { .. } => panic!("index already loaded"),
        }
    }
    assert_eq!(numbers, vec![0, 1, 2, 3]);
}

#[rstest]
#[case::far_beyond(10)]
#[case::just_beyond(4)]
fn request_past_last_segment_is_end_of_stream(#[case] next: u64) {
    let mut source = indexed_source(1, EventBus::default());
    let previous = MediaChunk {
        representation: 0,
        format: source.holder(0).unwrap().format_id().clone(),
        segment_number: next - 1,
        start_time_us: 0,
        end_time_us: 0,
    };
    assert_eq!(
        source
            .get_next_chunk(0, 0, Some(&previous), Instant::now())
            .unwrap(),
        ChunkRequest::EndOfStream(EndReason::BeyondIndex)
    );
}

#[test]
fn not_found_on_last_segment_ends_stream() {
    let mut source = indexed_source(2, EventBus::default());
    let now = Instant::now();
    let not_found = SessionError::Demux(DemuxError::Http { status: 404 });

    assert_eq!(
        source.on_chunk_load_error(0, Some(3), &not_found, 1, now),
        LoadErrorAction::EndOfStream
    );
    assert!(source.is_missing_last_segment());
    assert!(source.maybe_throw_error().is_ok());
    assert_eq!(
        source.get_next_chunk(0, 100 * SEC, None, now).unwrap(),
        ChunkRequest::EndOfStream(EndReason::MissingLastSegment)
    );
}

#[tokio::test]
async fn failed_representation_is_excluded_for_five_seconds() {
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let mut source = indexed_source(2, events);
    let now = Instant::now();

    let a = media(source.get_next_chunk(0, 0, None, now).unwrap());
    assert_eq!(a.representation, 0);

    let transient = SessionError::RetryExhausted {
        attempts: 4,
        source: DemuxError::Http { status: 503 },
    };
    assert_eq!(
        source.on_chunk_load_error(0, Some(a.segment_number), &transient, 1, now),
        LoadErrorAction::Excluded {
            representation: 0,
            duration: Duration::from_millis(5000),
        }
    );

    let b = media(source.get_next_chunk(0, 0, None, now).unwrap());
    assert_eq!(b.representation, 1);
    assert_eq!(b.segment_number, a.segment_number);

    let later = now + Duration::from_millis(5000);
    assert!(!source.selection().is_excluded(0, later));
    assert!(source.selection().is_excluded(0, later - Duration::from_millis(1)));

    let mut excluded = false;
    let mut selected = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            SabrEvent::RepresentationExcluded {
                representation: 0,
                duration,
                ..
            } => {
                assert_eq!(duration, Duration::from_millis(5000));
                excluded = true;
            }
            SabrEvent::RepresentationSelected { from: 0, to: 1, .. } => selected = true,
            _ => {}
        }
    }
    assert!(excluded && selected);
}

#[test]
fn exhausting_candidates_is_fatal() {
    let mut source = indexed_source(2, EventBus::default());
    let now = Instant::now();
    let error = SessionError::Demux(DemuxError::Http { status: 500 });

    assert!(matches!(
        source.on_chunk_load_error(0, Some(0), &error, 1, now),
        LoadErrorAction::Excluded { .. }
    ));
    assert!(matches!(
        source.on_chunk_load_error(1, Some(0), &error, 1, now),
        LoadErrorAction::Fatal(_)
    ));
    assert!(source.get_next_chunk(0, 0, None, now).is_err());
}
