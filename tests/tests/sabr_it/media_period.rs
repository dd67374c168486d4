use std::{sync::Arc, time::Duration};

use rstest::rstest;
use sabr::{
    AbrMode, LoadingInfo, MediaPeriod, PeriodCallback, ReadResult, SabrConfig, SabrError,
    SampleKind, SeekParameters, TrackSelectionSpec,
};
use sabr_manifest::{FormatId, TrackType};
use sabr_stream::{DemuxError, PollBatch, RetryPolicy};
use sabr_test_utils::{ScriptedDemux, fixtures};
use web_time::Instant;

use crate::common::tracing_setup;

const SEC: u64 = 1_000_000;

/// Pipeline stand-in that ignores notifications.
struct Pipeline;

impl PeriodCallback for Pipeline {
    fn on_prepared(&self) {}

    fn on_continue_loading_requested(&self) {}
}

fn config() -> SabrConfig {
    SabrConfig::new()
        .with_max_buffer_duration(Duration::from_secs(300))
        .with_retry(RetryPolicy::none())
        .with_exclusion_duration(Duration::from_millis(5000))
}

fn auto(group: usize) -> Option<TrackSelectionSpec> {
    Some(TrackSelectionSpec {
        group,
        mode: AbrMode::Auto(None),
    })
}

fn period_over(
    manifest: sabr_manifest::Manifest,
    demux: ScriptedDemux,
    selections: &[Option<TrackSelectionSpec>],
) -> MediaPeriod<ScriptedDemux> {
    let mut period = MediaPeriod::new(Arc::new(manifest), demux, config());
    period.prepare(Box::new(Pipeline), 0);
    let retain = vec![false; selections.len()];
    period.select_tracks(selections, &retain, 0).unwrap();
    period
}

/// Drains one stream, returning (kind, format itag, segment number) triples.
fn drain(period: &mut MediaPeriod<ScriptedDemux>, slot: usize) -> Vec<(SampleKind, u32, u64)> {
    let stream = period.sample_stream(slot).unwrap();
    let mut out = Vec::new();
    loop {
        match stream.read_sample() {
            ReadResult::Sample(s) => out.push((s.kind, s.format.itag, s.sequence_number)),
            ReadResult::NothingRead | ReadResult::EndOfStream => return out,
        }
    }
}

fn media_numbers(samples: &[(SampleKind, u32, u64)]) -> Vec<u64> {
    samples
        .iter()
        .filter(|(kind, ..)| *kind == SampleKind::Media)
        .map(|(.., n)| *n)
        .collect()
}

#[rstest]
fn interleaved_playback_delivers_both_tracks_in_order(_tracing_setup: ()) {
    let video = FormatId::new(299, 1);
    let audio = FormatId::new(140, 1);
    let demux = ScriptedDemux::new()
        .with_batch(PollBatch {
            audio: fixtures::audio_segments(&audio, 0..1, true),
            video: fixtures::video_segments(&video, 0..2, true),
        })
        .with_batch(PollBatch {
            audio: fixtures::audio_segments(&audio, 1..4, false),
            video: vec![],
        })
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&video, 2..4, false),
        });
    let recorder = demux.recorder();
    let mut period = period_over(fixtures::manifest(), demux, &[auto(0), auto(1)]);

    assert!(period.continue_loading(&LoadingInfo::new(0)).unwrap());
    assert_eq!(period.buffered_position_us(), None);
    assert!(!period.is_loading());

    let video_samples = drain(&mut period, 0);
    let audio_samples = drain(&mut period, 1);
    assert_eq!(video_samples[0].0, SampleKind::Init);
    assert_eq!(audio_samples[0].0, SampleKind::Init);
    assert_eq!(media_numbers(&video_samples), vec![0, 1, 2, 3]);
    assert_eq!(media_numbers(&audio_samples), vec![0, 1, 2, 3]);
    assert!(period.sample_stream(0).unwrap().is_ended());

    period.release().unwrap();
    assert_eq!(recorder.destroys(), 1);
}

#[test]
fn seek_to_65s_starts_at_segment_two() {
    let video = FormatId::new(299, 1);
    let audio = FormatId::new(140, 1);
    let demux = ScriptedDemux::new().with_batch(PollBatch {
        audio: fixtures::audio_segments(&audio, 0..4, true),
        video: fixtures::video_segments(&video, 0..4, true),
    });
    let mut period = period_over(fixtures::manifest(), demux, &[auto(0), auto(1)]);
    // Buffers the whole presentation, so the seek stays within it.
    period.continue_loading(&LoadingInfo::new(0)).unwrap();

    let target = period.adjusted_seek_position_us(65 * SEC, Some(SeekParameters::PreviousSync));
    assert_eq!(target, 60 * SEC);

    period.seek_to_us(65 * SEC);
    assert!(!period.continue_loading(&LoadingInfo::new(65 * SEC)).unwrap());
    let first_media = drain(&mut period, 0)
        .into_iter()
        .find(|(kind, ..)| *kind == SampleKind::Media)
        .unwrap();
    assert_eq!(first_media.2, 2);
}

#[test]
fn seek_past_buffer_skips_stale_segments() {
    let video = FormatId::new(299, 1);
    let demux = ScriptedDemux::new().with_batch(PollBatch {
        audio: vec![],
        video: fixtures::video_segments(&video, 0..4, true),
    });
    let recorder = demux.recorder();
    let config = config().with_max_buffer_duration(Duration::from_secs(40));
    let mut period = MediaPeriod::new(Arc::new(fixtures::manifest()), demux, config);
    period.prepare(Box::new(Pipeline), 0);
    period.select_tracks(&[auto(0)], &[false], 0).unwrap();

    period.continue_loading(&LoadingInfo::new(0)).unwrap();
    assert_eq!(period.next_load_position_us(), Some(60 * SEC));

    period.seek_to_us(95 * SEC);
    period.continue_loading(&LoadingInfo::new(95 * SEC)).unwrap();
    let samples = drain(&mut period, 0);
    assert_eq!(media_numbers(&samples), vec![3]);
    assert_eq!(samples[0].0, SampleKind::Media);
    assert_eq!(recorder.polls(), 1);
}

#[test]
fn transient_failure_falls_back_to_next_representation() {
    let top = FormatId::new(299, 1);
    let next = FormatId::new(298, 1);
    let demux = ScriptedDemux::new()
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&top, 0..1, true),
        })
        .with_error(DemuxError::Http { status: 503 })
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&next, 1..4, true),
        });
    let recorder = demux.recorder();
    let mut period = period_over(
        fixtures::manifest_with_video_ladder(2),
        demux,
        &[Some(TrackSelectionSpec {
            group: 0,
            mode: AbrMode::Auto(Some(0)),
        })],
    );

    period.continue_loading(&LoadingInfo::new(0)).unwrap();
    assert!(period.maybe_throw_error().is_ok());
    assert_eq!(recorder.selected_formats(), vec![next]);

    assert_eq!(
        drain(&mut period, 0),
        vec![
            (SampleKind::Init, 299, 0),
            (SampleKind::Media, 299, 0),
            (SampleKind::Init, 298, 0),
            (SampleKind::Media, 298, 1),
            (SampleKind::Media, 298, 2),
            (SampleKind::Media, 298, 3),
        ]
    );
}

#[test]
fn excluded_representation_returns_after_exclusion_expires() {
    let top = FormatId::new(299, 1);
    let next = FormatId::new(298, 1);
    let demux = ScriptedDemux::new()
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&top, 0..1, true),
        })
        .with_error(DemuxError::Http { status: 503 })
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&next, 1..2, true),
        })
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&top, 2..3, true),
        });
    let recorder = demux.recorder();
    let mut period = MediaPeriod::new(
        Arc::new(fixtures::manifest_with_video_ladder(2)),
        demux,
        config().with_max_buffer_duration(Duration::from_secs(60)),
    );
    period.prepare(Box::new(Pipeline), 0);
    period
        .select_tracks(
            &[Some(TrackSelectionSpec {
                group: 0,
                mode: AbrMode::Manual(0),
            })],
            &[false],
            0,
        )
        .unwrap();

    let start = Instant::now();
    let first = LoadingInfo {
        playback_position_us: 0,
        now: start,
    };
    assert!(period.continue_loading(&first).unwrap());
    assert_eq!(recorder.selected_formats(), vec![next.clone()]);
    let selection = period.sample_stream(0).unwrap().chunk_source().selection();
    assert!(selection.is_excluded(0, start + Duration::from_millis(4999)));
    assert!(!selection.is_excluded(0, start + Duration::from_millis(5000)));

    let after_expiry = LoadingInfo {
        playback_position_us: 30 * SEC,
        now: start + Duration::from_millis(5000),
    };
    assert!(period.continue_loading(&after_expiry).unwrap());
    assert_eq!(recorder.selected_formats(), vec![next, top]);

    assert_eq!(
        drain(&mut period, 0),
        vec![
            (SampleKind::Init, 299, 0),
            (SampleKind::Media, 299, 0),
            (SampleKind::Init, 298, 0),
            (SampleKind::Media, 298, 1),
            (SampleKind::Init, 299, 0),
            (SampleKind::Media, 299, 2),
        ]
    );
}

#[test]
fn parse_failure_surfaces_as_fatal() {
    let video = FormatId::new(299, 1);
    let demux = ScriptedDemux::new()
        .with_batch(PollBatch {
            audio: vec![],
            video: fixtures::video_segments(&video, 0..1, true),
        })
        .with_error(DemuxError::Parse("truncated moof".into()));
    let mut period = period_over(fixtures::manifest(), demux, &[auto(0)]);

    let err = period.continue_loading(&LoadingInfo::new(0)).unwrap_err();
    assert!(matches!(
        err,
        SabrError::LoadFailed {
            track: TrackType::Video,
            ..
        }
    ));
    assert!(period.maybe_throw_error().is_err());
}

#[test]
fn reselection_releases_dropped_stream_only() {
    let demux = ScriptedDemux::new();
    let mut period = period_over(fixtures::manifest(), demux, &[auto(0), auto(1)]);

    let reset = period
        .select_tracks(&[auto(0), None], &[true, true], 0)
        .unwrap();
    assert_eq!(reset, vec![false, false]);
    assert!(period.sample_stream(1).is_none());

    let reset = period
        .select_tracks(&[auto(0), auto(1)], &[true, true], 0)
        .unwrap();
    assert_eq!(reset, vec![false, true]);
}

#[test]
fn dropping_period_destroys_session_once() {
    let demux = ScriptedDemux::new();
    let recorder = demux.recorder();
    let period = period_over(fixtures::manifest(), demux, &[auto(0)]);
    drop(period);
    assert_eq!(recorder.destroys(), 1);
}
