use std::{sync::Arc, time::Duration};

use sabr::{AbrMode, LoadingInfo, MediaPeriod, PeriodCallback, SabrConfig, TrackSelectionSpec};
use sabr_events::{EventBus, SabrEvent};
use sabr_manifest::{FormatId, TrackType};
use sabr_stream::PollBatch;
use sabr_test_utils::{ScriptedDemux, fixtures};

struct Pipeline;

impl PeriodCallback for Pipeline {
    fn on_prepared(&self) {}

    fn on_continue_loading_requested(&self) {}
}

#[tokio::test]
async fn playback_publishes_lifecycle_events() {
    let events = EventBus::new(256);
    let mut rx = events.subscribe();
    let video = FormatId::new(299, 1);
    let demux = ScriptedDemux::new().with_batch(PollBatch {
        audio: vec![],
        video: fixtures::video_segments(&video, 0..4, true),
    });

    let config = SabrConfig::new()
        .with_events(events)
        .with_max_buffer_duration(Duration::from_secs(300));
    let mut period = MediaPeriod::new(Arc::new(fixtures::manifest()), demux, config);
    period.prepare(Box::new(Pipeline), 0);
    period
        .select_tracks(
            &[Some(TrackSelectionSpec {
                group: 0,
                mode: AbrMode::Auto(None),
            })],
            &[false],
            0,
        )
        .unwrap();
    period.continue_loading(&LoadingInfo::new(0)).unwrap();
    period.release().unwrap();

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }

    assert!(matches!(
        received.first(),
        Some(SabrEvent::SessionCreated { video: Some(_), audio: None })
    ));
    let loaded: Vec<u64> = received
        .iter()
        .filter_map(|e| match e {
            SabrEvent::ChunkLoaded { segment, .. } => Some(*segment),
            _ => None,
        })
        .collect();
    assert_eq!(loaded, vec![0, 1, 2, 3]);
    assert!(received.iter().any(|e| matches!(
        e,
        SabrEvent::EndOfStream {
            track: TrackType::Video
        }
    )));
    assert!(received.iter().any(|e| matches!(e, SabrEvent::SegmentsPolled { video: 5, .. })));
    assert!(matches!(received.last(), Some(SabrEvent::SessionDestroyed)));
}
