use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::{
    AdaptationSet, AudioRole, FormatId, Manifest, ManifestError, ManifestResult, MediaAttributes,
    Representation, TrackType,
};

const DEFAULT_CHANNEL_COUNT: u16 = 2;

/// One stream entry from upstream metadata, before grouping.
#[derive(Clone, Debug, Default)]
pub struct StreamDescriptor {
    pub itag: u32,
    pub last_modified: u64,
    pub xtags: Option<String>,
    pub mime_type: String,
    pub codec: String,
    pub bitrate: Option<u64>,
    pub is_video: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub audio_track_id: Option<String>,
    pub audio_track_locale: Option<String>,
    pub audio_track_type: Option<String>,
}

impl StreamDescriptor {
    fn format_id(&self) -> FormatId {
        FormatId {
            itag: self.itag,
            last_modified: self.last_modified,
            xtags: self.xtags.clone(),
        }
    }

    fn into_representation(self) -> Representation {
        let attrs = if self.is_video {
            MediaAttributes::Video {
                width: self.width,
                height: self.height,
                frame_rate: self.fps,
            }
        } else {
            let language = self
                .audio_track_id
                .as_deref()
                .and_then(|id| id.get(..2))
                .map(str::to_owned)
                .or_else(|| self.audio_track_locale.clone());
            MediaAttributes::Audio {
                channel_count: DEFAULT_CHANNEL_COUNT,
                language,
                role: AudioRole::from_track_type(self.audio_track_type.as_deref()),
            }
        };

        Representation {
            format_id: self.format_id(),
            codec: self.codec,
            mime_type: self.mime_type,
            bitrate: self.bitrate.unwrap_or(0),
            attrs,
        }
    }
}

/// Assembles a [`Manifest`] from upstream stream descriptors.
///
/// Video streams are grouped by mime type, audio streams by mime type plus
/// audio-track id. Video adaptation sets precede audio ones; within a group
/// descriptor order is preserved.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    video_id: Option<String>,
    session_uri: Option<String>,
    ustreamer_config: Bytes,
    po_token: Option<Bytes>,
    duration: Duration,
    streams: Vec<StreamDescriptor>,
}

impl ManifestBuilder {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: Some(video_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn session_uri(mut self, uri: impl Into<String>) -> Self {
        self.session_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn ustreamer_config(mut self, config: impl Into<Bytes>) -> Self {
        self.ustreamer_config = config.into();
        self
    }

    #[must_use]
    pub fn po_token(mut self, token: impl Into<Bytes>) -> Self {
        self.po_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn stream(mut self, stream: StreamDescriptor) -> Self {
        self.streams.push(stream);
        self
    }

    #[must_use]
    pub fn streams(mut self, streams: impl IntoIterator<Item = StreamDescriptor>) -> Self {
        self.streams.extend(streams);
        self
    }

    pub fn build(self) -> ManifestResult<Manifest> {
        let video_id = self.video_id.ok_or(ManifestError::MissingField("video_id"))?;
        let raw_uri = self
            .session_uri
            .ok_or(ManifestError::MissingField("session_uri"))?;
        let session_uri =
            Url::parse(&raw_uri).map_err(|e| ManifestError::InvalidUri(e.to_string()))?;

        let mut video_groups: Vec<(String, Vec<Representation>)> = Vec::new();
        let mut audio_groups: Vec<(String, Vec<Representation>)> = Vec::new();

        for stream in self.streams {
            let (groups, key) = if stream.is_video {
                (&mut video_groups, stream.mime_type.clone())
            } else {
                let track = stream.audio_track_id.as_deref().unwrap_or_default();
                (&mut audio_groups, format!("{}{track}", stream.mime_type))
            };
            push_grouped(groups, key, stream.into_representation());
        }

        let mut adaptation_sets = Vec::with_capacity(video_groups.len() + audio_groups.len());
        for (_, reps) in video_groups {
            adaptation_sets.push(AdaptationSet::new(TrackType::Video, reps)?);
        }
        for (_, reps) in audio_groups {
            adaptation_sets.push(AdaptationSet::new(TrackType::Audio, reps)?);
        }

        tracing::debug!(
            video_id,
            sets = adaptation_sets.len(),
            duration_ms = self.duration.as_millis(),
            "manifest built"
        );

        Ok(Manifest {
            video_id,
            session_uri,
            ustreamer_config: self.ustreamer_config,
            po_token: self.po_token,
            duration: self.duration,
            adaptation_sets,
        })
    }
}

/// Appends to the group for `key`, keeping groups in first-seen order.
fn push_grouped(groups: &mut Vec<(String, Vec<Representation>)>, key: String, rep: Representation) {
    match groups.iter_mut().find(|(k, _)| *k == key) {
        Some((_, reps)) => reps.push(rep),
        None => groups.push((key, vec![rep])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(itag: u32, mime: &str) -> StreamDescriptor {
        StreamDescriptor {
            itag,
            last_modified: 1,
            mime_type: mime.into(),
            codec: "avc1.640028".into(),
            bitrate: Some(1_000_000),
            is_video: true,
            width: Some(1920),
            height: Some(1080),
            fps: Some(30.0),
            ..StreamDescriptor::default()
        }
    }

    fn audio(itag: u32, track_id: Option<&str>, track_type: Option<&str>) -> StreamDescriptor {
        StreamDescriptor {
            itag,
            last_modified: 1,
            mime_type: "audio/mp4".into(),
            codec: "mp4a.40.2".into(),
            bitrate: Some(128_000),
            audio_track_id: track_id.map(str::to_owned),
            audio_track_locale: Some("de".into()),
            audio_track_type: track_type.map(str::to_owned),
            ..StreamDescriptor::default()
        }
    }

    fn builder() -> ManifestBuilder {
        ManifestBuilder::new("abc123")
            .session_uri("https://example.com/videoplayback")
            .ustreamer_config(&b"cfg"[..])
            .duration(Duration::from_secs(120))
    }

    #[test]
    fn groups_video_by_mime_and_audio_by_track() {
        let manifest = builder()
            .streams([
                video(299, "video/mp4"),
                video(303, "video/webm"),
                video(298, "video/mp4"),
                audio(140, Some("en.4"), Some("original")),
                audio(251, Some("fr.3"), Some("dubbed")),
                audio(139, Some("en.4"), Some("original")),
            ])
            .build()
            .unwrap();

        let kinds: Vec<_> = manifest
            .adaptation_sets
            .iter()
            .map(|s| (s.track_type(), s.len()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TrackType::Video, 2),
                (TrackType::Video, 1),
                (TrackType::Audio, 2),
                (TrackType::Audio, 1),
            ]
        );

        let english = &manifest.adaptation_sets[2];
        assert_eq!(english.get(0).unwrap().language(), Some("en"));
        assert!(matches!(
            english.get(1).unwrap().attrs,
            MediaAttributes::Audio {
                channel_count: 2,
                role: AudioRole::Main,
                ..
            }
        ));
    }

    #[test]
    fn language_falls_back_to_locale() {
        let manifest = builder().stream(audio(140, None, None)).build().unwrap();
        let rep = manifest.representation(0, 0).unwrap();
        assert_eq!(rep.language(), Some("de"));
    }

    #[test]
    fn missing_session_uri_is_rejected() {
        let err = ManifestBuilder::new("x").build().unwrap_err();
        assert_eq!(err, ManifestError::MissingField("session_uri"));
    }

    #[test]
    fn duplicate_stream_is_rejected() {
        let err = builder()
            .streams([video(299, "video/mp4"), video(299, "video/mp4")])
            .build()
            .unwrap_err();
        assert_eq!(err, ManifestError::DuplicateFormat(FormatId::new(299, 1)));
    }
}
