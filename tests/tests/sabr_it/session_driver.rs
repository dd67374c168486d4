use std::time::Duration;

use rstest::rstest;
use sabr_manifest::{FormatId, TrackType};
use sabr_stream::{
    DemuxError, DriverOptions, PollBatch, RetryPolicy, SessionDriver, SessionError, SessionParams,
    StreamSession,
};
use sabr_test_utils::{ScriptedDemux, fixtures};
use tokio_util::sync::CancellationToken;

use crate::common::{cancel_token, tracing_setup};

fn open(demux: ScriptedDemux, options: DriverOptions) -> SessionDriver<ScriptedDemux> {
    let manifest = fixtures::manifest();
    let params = SessionParams::from_manifest(
        &manifest,
        manifest.representation(1, 0),
        manifest.representation(0, 0),
        Duration::from_secs(1),
    );
    let session = StreamSession::initialize(demux, &params).unwrap();
    SessionDriver::new(session, options)
}

fn video_format() -> FormatId {
    FormatId::new(299, 1)
}

fn audio_format() -> FormatId {
    FormatId::new(140, 1)
}

#[rstest]
fn audio_read_after_video_only_batch_polls_once(_tracing_setup: ()) {
    let demux = ScriptedDemux::new()
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&video_format(), 0..2, false),
        })
        .with_batch(PollBatch {
            audio: fixtures::audio_segments(&audio_format(), 0..1, false),
            video: vec![],
        });
    let recorder = demux.recorder();
    let driver = open(demux, DriverOptions::default());
    let video = driver.reader(TrackType::Video);
    let audio = driver.reader(TrackType::Audio);

    assert_eq!(video.next_segment().unwrap().unwrap().sequence_number, 0);
    assert_eq!(recorder.polls(), 1);

    let segment = audio.next_segment().unwrap().unwrap();
    assert_eq!(segment.track, TrackType::Audio);
    assert_eq!(recorder.polls(), 2);

    // The second video segment was queued by the first poll.
    assert_eq!(video.next_segment().unwrap().unwrap().sequence_number, 1);
    assert_eq!(recorder.polls(), 2);
}

#[rstest]
#[case::single_batch(vec![0..8])]
#[case::split_batches(vec![0..3, 3..4, 4..8])]
#[case::overlapping_batches(vec![0..4, 2..6, 6..8])]
fn round_trip_yields_every_segment_once(#[case] batches: Vec<std::ops::Range<u64>>) {
    let mut demux = ScriptedDemux::new();
    for range in batches {
        demux = demux.with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&video_format(), range, false),
        });
    }
    let driver = open(demux, DriverOptions::default());
    let video = driver.reader(TrackType::Video);

    let mut numbers = Vec::new();
    while let Some(segment) = video.next_segment().unwrap() {
        numbers.push(segment.sequence_number);
    }
    assert_eq!(numbers, (0..8).collect::<Vec<_>>());
}

#[test]
fn second_destroy_is_rejected() {
    let demux = ScriptedDemux::new();
    let recorder = demux.recorder();
    let driver = open(demux, DriverOptions::default());

    driver.destroy().unwrap();
    assert_eq!(driver.destroy(), Err(SessionError::AlreadyDestroyed));
    assert_eq!(recorder.destroys(), 1);
    assert_eq!(
        driver.reader(TrackType::Video).next_segment().unwrap_err(),
        SessionError::Destroyed
    );
}

#[test]
fn transient_failure_is_retried() {
    let demux = ScriptedDemux::new()
        .with_error(DemuxError::Http { status: 503 })
        .with_error(DemuxError::Timeout)
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&video_format(), 0..1, false),
        });
    let recorder = demux.recorder();
    let driver = open(
        demux,
        DriverOptions {
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
            ..DriverOptions::default()
        },
    );

    let segment = driver.reader(TrackType::Video).next_segment().unwrap();
    assert!(segment.is_some());
    assert_eq!(recorder.polls(), 3);
}

#[test]
fn parse_failure_is_never_retried() {
    let demux = ScriptedDemux::new().with_error(DemuxError::Parse("bad sidx".into()));
    let recorder = demux.recorder();
    let driver = open(demux, DriverOptions::default());
    let video = driver.reader(TrackType::Video);
    let audio = driver.reader(TrackType::Audio);

    assert!(video.next_segment().unwrap_err().is_fatal());
    assert!(audio.next_segment().unwrap_err().is_fatal());
    assert_eq!(recorder.polls(), 1);
}

#[rstest]
fn cancelled_driver_stops_polling(cancel_token: CancellationToken) {
    let demux = ScriptedDemux::new();
    let recorder = demux.recorder();
    let driver = open(
        demux,
        DriverOptions {
            cancel: cancel_token.clone(),
            ..DriverOptions::default()
        },
    );
    cancel_token.cancel();

    assert_eq!(
        driver.reader(TrackType::Audio).next_segment().unwrap_err(),
        SessionError::Cancelled
    );
    assert_eq!(recorder.polls(), 0);
}

#[test]
fn released_reader_gets_no_more_segments() {
    let demux = ScriptedDemux::new()
        .with_batch(PollBatch {
            audio: fixtures::audio_segments(&audio_format(), 0..2, false),
            video: fixtures::video_segments(&video_format(), 0..1, false),
        })
        .with_batch(PollBatch {
            audio: fixtures::audio_segments(&audio_format(), 2..3, false),
            video: fixtures::video_segments(&video_format(), 1..2, false),
        });
    let driver = open(demux, DriverOptions::default());
    let audio = driver.reader(TrackType::Audio);
    let video = driver.reader(TrackType::Video);

    assert!(video.next_segment().unwrap().is_some());
    audio.release();
    assert!(video.next_segment().unwrap().is_some());

    let reopened = driver.reader(TrackType::Audio);
    assert_eq!(reopened.pending(), 0);
}
