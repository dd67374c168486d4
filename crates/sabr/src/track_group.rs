use sabr_manifest::{AudioRole, FormatId, Manifest, MediaAttributes, Representation, TrackType};

/// Format descriptor exposed to the playback pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackFormat {
    pub id: String,
    pub format_id: FormatId,
    pub mime_type: String,
    pub codec: String,
    pub bitrate: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub channel_count: Option<u16>,
    pub language: Option<String>,
    pub role: AudioRole,
}

impl From<&Representation> for TrackFormat {
    fn from(rep: &Representation) -> Self {
        let mut format = Self {
            id: rep.format_id.to_string(),
            format_id: rep.format_id.clone(),
            mime_type: rep.mime_type.clone(),
            codec: rep.codec.clone(),
            bitrate: rep.bitrate,
            width: None,
            height: None,
            frame_rate: None,
            channel_count: None,
            language: None,
            role: AudioRole::None,
        };
        match &rep.attrs {
            MediaAttributes::Video {
                width,
                height,
                frame_rate,
            } => {
                format.width = *width;
                format.height = *height;
                format.frame_rate = *frame_rate;
            }
            MediaAttributes::Audio {
                channel_count,
                language,
                role,
            } => {
                format.channel_count = Some(*channel_count);
                format.language.clone_from(language);
                format.role = *role;
            }
        }
        format
    }
}

/// Representations of one adaptation set, as offered for selection.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackGroup {
    pub id: String,
    pub track_type: TrackType,
    /// Index of the adaptation set in the manifest.
    pub adaptation_set: usize,
    pub formats: Vec<TrackFormat>,
}

impl TrackGroup {
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn format(&self, index: usize) -> Option<&TrackFormat> {
        self.formats.get(index)
    }

    pub fn index_of(&self, format_id: &FormatId) -> Option<usize> {
        self.formats.iter().position(|f| f.format_id == *format_id)
    }
}

/// One track group per adaptation set, in manifest order.
pub fn build_track_groups(manifest: &Manifest) -> Vec<TrackGroup> {
    manifest
        .adaptation_sets
        .iter()
        .enumerate()
        .map(|(n, set)| TrackGroup {
            id: format!("sabr:{n}"),
            track_type: set.track_type(),
            adaptation_set: n,
            formats: set.representations().iter().map(TrackFormat::from).collect(),
        })
        .collect()
}
