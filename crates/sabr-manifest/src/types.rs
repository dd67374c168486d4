use std::fmt;

/// Kind of elementary stream a representation carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackType {
    Audio,
    Video,
}

impl TrackType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side identity of one encoding.
///
/// The streaming server addresses formats by `itag` plus the `last_modified`
/// stamp of the encode; `xtags` distinguishes variants of the same itag
/// (for example, alternate audio tracks).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormatId {
    pub itag: u32,
    pub last_modified: u64,
    pub xtags: Option<String>,
}

impl FormatId {
    pub fn new(itag: u32, last_modified: u64) -> Self {
        Self {
            itag,
            last_modified,
            xtags: None,
        }
    }

    #[must_use]
    pub fn with_xtags(mut self, xtags: impl Into<String>) -> Self {
        self.xtags = Some(xtags.into());
        self
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.itag, self.last_modified)?;
        if let Some(xtags) = &self.xtags {
            write!(f, ":{xtags}")?;
        }
        Ok(())
    }
}

/// Role of an audio track relative to the main programme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AudioRole {
    #[default]
    None,
    Main,
    Dub,
    DescribesVideo,
    Supplementary,
}

impl AudioRole {
    /// Maps the upstream audio-track type string (case-insensitive).
    pub fn from_track_type(track_type: Option<&str>) -> Self {
        match track_type.map(str::to_ascii_lowercase).as_deref() {
            Some("descriptive") => Self::DescribesVideo,
            Some("original") => Self::Main,
            Some("dubbed" | "auto-dubbed") => Self::Dub,
            Some("secondary") => Self::Supplementary,
            _ => Self::None,
        }
    }
}

/// Track-type specific attributes of a representation.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaAttributes {
    Video {
        width: Option<u32>,
        height: Option<u32>,
        frame_rate: Option<f32>,
    },
    Audio {
        channel_count: u16,
        language: Option<String>,
        role: AudioRole,
    },
}

impl MediaAttributes {
    pub fn track_type(&self) -> TrackType {
        match self {
            Self::Video { .. } => TrackType::Video,
            Self::Audio { .. } => TrackType::Audio,
        }
    }
}

/// One encoded variant of a track.
#[derive(Clone, Debug, PartialEq)]
pub struct Representation {
    pub format_id: FormatId,
    /// RFC 6381 codec string, e.g. `avc1.640028` or `mp4a.40.2`.
    pub codec: String,
    /// Container mime type, e.g. `video/mp4`.
    pub mime_type: String,
    /// Average bitrate in bits per second.
    pub bitrate: u64,
    pub attrs: MediaAttributes,
}

impl Representation {
    pub fn track_type(&self) -> TrackType {
        self.attrs.track_type()
    }

    pub fn itag(&self) -> u32 {
        self.format_id.itag
    }

    pub fn last_modified(&self) -> u64 {
        self.format_id.last_modified
    }

    pub fn language(&self) -> Option<&str> {
        match &self.attrs {
            MediaAttributes::Audio { language, .. } => language.as_deref(),
            MediaAttributes::Video { .. } => None,
        }
    }
}
