use std::time::Duration;

use bytes::Bytes;
use sabr_manifest::{FormatId, Manifest, Representation, TrackType};
use url::Url;

use crate::{DemuxError, Segment};

/// Arguments for opening a native session.
#[derive(Clone, Debug)]
pub struct SessionParams {
    pub session_id: String,
    pub session_uri: Url,
    /// Opaque per-session configuration, passed through unmodified.
    pub config: Bytes,
    pub auth: Option<Bytes>,
    pub audio: Option<FormatId>,
    pub video: Option<FormatId>,
    /// Per-attempt deadline the native side applies to its network reads.
    pub request_timeout: Duration,
}

impl SessionParams {
    pub fn from_manifest(
        manifest: &Manifest,
        audio: Option<&Representation>,
        video: Option<&Representation>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session_id: manifest.video_id.clone(),
            session_uri: manifest.session_uri.clone(),
            config: manifest.ustreamer_config.clone(),
            auth: manifest.po_token.clone(),
            audio: audio.map(|r| r.format_id.clone()),
            video: video.map(|r| r.format_id.clone()),
            request_timeout,
        }
    }

    pub fn format_for(&self, track: TrackType) -> Option<&FormatId> {
        match track {
            TrackType::Audio => self.audio.as_ref(),
            TrackType::Video => self.video.as_ref(),
        }
    }
}

/// Segments produced by one `poll`.
///
/// Within a track, segments are in non-decreasing sequence order. An empty
/// batch means the stream has ended.
#[derive(Debug, Default)]
pub struct PollBatch {
    pub audio: Vec<Segment>,
    pub video: Vec<Segment>,
}

impl PollBatch {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.video.is_empty()
    }

    pub fn len(&self) -> usize {
        self.audio.len() + self.video.len()
    }
}

/// The native demultiplexer behind one server-multiplexed connection.
///
/// Calls are single-caller: the implementation never sees concurrent calls
/// for one handle. The first segment delivered for a format after
/// `initialize` or `select_format` is an init segment carrying its
/// [`crate::ChunkIndex`].
pub trait NativeDemux: Send + 'static {
    type Handle: Send;

    fn initialize(&mut self, params: &SessionParams) -> Result<Self::Handle, DemuxError>;

    /// Blocks until at least one segment is available on either track, or
    /// returns an empty batch at end of stream.
    fn poll(&mut self, handle: &mut Self::Handle) -> Result<PollBatch, DemuxError>;

    /// Switches the live representation of `representation`'s track.
    fn select_format(
        &mut self,
        handle: &mut Self::Handle,
        representation: &Representation,
    ) -> Result<(), DemuxError>;

    /// Releases the handle. Called exactly once per handle.
    fn destroy(&mut self, handle: Self::Handle);
}
