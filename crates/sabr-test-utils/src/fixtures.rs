//! Manifests and segments shared by unit and integration tests.
//!
//! The reference manifest has one video representation (itag 299) and one
//! audio representation (itag 140), both last-modified 1, lasting 120 s in
//! four 30 s segments.

use std::{ops::Range, time::Duration};

use bytes::Bytes;
use sabr_manifest::{
    AdaptationSet, AudioRole, FormatId, Manifest, MediaAttributes, Representation, TrackType,
};
use sabr_stream::{ChunkIndex, Segment};
use url::Url;

pub const SEGMENT_US: u64 = 30_000_000;
pub const SEGMENT_COUNT: usize = 4;
pub const DURATION: Duration = Duration::from_secs(120);

const VIDEO_ITAGS: [u32; 5] = [299, 298, 137, 136, 135];

pub fn audio_representation() -> Representation {
    Representation {
        format_id: FormatId::new(140, 1),
        codec: "mp4a.40.2".into(),
        mime_type: "audio/mp4".into(),
        bitrate: 128_000,
        attrs: MediaAttributes::Audio {
            channel_count: 2,
            language: Some("en".into()),
            role: AudioRole::Main,
        },
    }
}

pub fn video_representation() -> Representation {
    video_rung(299, 4_000_000, 1080)
}

fn video_rung(itag: u32, bitrate: u64, height: u32) -> Representation {
    Representation {
        format_id: FormatId::new(itag, 1),
        codec: "avc1.64002a".into(),
        mime_type: "video/mp4".into(),
        bitrate,
        attrs: MediaAttributes::Video {
            width: Some(height * 16 / 9),
            height: Some(height),
            frame_rate: Some(60.0),
        },
    }
}

fn manifest_of(adaptation_sets: Vec<AdaptationSet>) -> Manifest {
    Manifest {
        video_id: "dQw4w9WgXcQ".into(),
        session_uri: Url::parse("https://rr1.example.com/videoplayback?sabr=1").unwrap(),
        ustreamer_config: Bytes::from_static(b"ustreamer-config"),
        po_token: Some(Bytes::from_static(b"po-token")),
        duration: DURATION,
        adaptation_sets,
    }
}

/// Video set at index 0, audio set at index 1.
pub fn manifest() -> Manifest {
    manifest_of(vec![
        AdaptationSet::new(TrackType::Video, vec![video_representation()]).unwrap(),
        AdaptationSet::new(TrackType::Audio, vec![audio_representation()]).unwrap(),
    ])
}

/// One video set with `rungs` representations, highest bitrate first.
pub fn manifest_with_video_ladder(rungs: usize) -> Manifest {
    assert!((1..=VIDEO_ITAGS.len()).contains(&rungs));
    let reps = VIDEO_ITAGS
        .iter()
        .take(rungs)
        .enumerate()
        .map(|(i, &itag)| {
            let step = (rungs - i) as u64;
            video_rung(itag, step * 1_000_000, 360 * (rungs - i) as u32)
        })
        .collect();
    manifest_of(vec![AdaptationSet::new(TrackType::Video, reps).unwrap()])
}

/// Video ladder at index 0 and the audio set at index 1.
pub fn manifest_with_ladder_and_audio(rungs: usize) -> Manifest {
    let mut manifest = manifest_with_video_ladder(rungs);
    manifest
        .adaptation_sets
        .push(AdaptationSet::new(TrackType::Audio, vec![audio_representation()]).unwrap());
    manifest
}

pub fn four_segment_index() -> ChunkIndex {
    ChunkIndex::uniform(SEGMENT_COUNT, SEGMENT_US)
}

pub fn init_segment(track: TrackType, format: &FormatId) -> Segment {
    Segment::init(
        track,
        format.clone(),
        four_segment_index(),
        vec![Bytes::from_static(b"ftyp"), Bytes::from_static(b"moov")],
    )
}

pub fn media_segment(track: TrackType, format: &FormatId, number: u64) -> Segment {
    Segment::media(
        track,
        format.clone(),
        number,
        SEGMENT_US,
        vec![
            Bytes::from_static(b"moof"),
            Bytes::from(format!("mdat:{}:{number}", format.itag)),
        ],
    )
}

/// Media segments `numbers`, preceded by the init segment when `with_init`.
pub fn segments(
    track: TrackType,
    format: &FormatId,
    numbers: Range<u64>,
    with_init: bool,
) -> Vec<Segment> {
    with_init
        .then(|| init_segment(track, format))
        .into_iter()
        .chain(numbers.map(|n| media_segment(track, format, n)))
        .collect()
}

pub fn video_segments(format: &FormatId, numbers: Range<u64>, with_init: bool) -> Vec<Segment> {
    segments(TrackType::Video, format, numbers, with_init)
}

pub fn audio_segments(format: &FormatId, numbers: Range<u64>, with_init: bool) -> Vec<Segment> {
    segments(TrackType::Audio, format, numbers, with_init)
}
