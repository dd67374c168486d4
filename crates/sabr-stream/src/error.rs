use sabr_manifest::TrackType;
use thiserror::Error;

/// Failure reported by the native demux boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DemuxError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("timeout")]
    Timeout,

    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Malformed bitstream. The native parser cannot resume mid-stream.
    #[error("parse error: {0}")]
    Parse(String),

    /// Server violated the session protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DemuxError {
    /// Whether repeating the same `poll` may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Timeout => true,
            Self::Http { status } => *status >= 500 || *status == 429 || *status == 408,
            Self::Parse(_) | Self::Protocol(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404 })
    }

    /// Whether the session can continue after this error.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, Self::Parse(_) | Self::Protocol(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// Invalid chunk index table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("{starts} start times but {durations} durations")]
    LengthMismatch { starts: usize, durations: usize },

    #[error("segment {segment} starts before segment {prev} ends")]
    Overlap { prev: u64, segment: u64 },
}

/// Errors from the session driver and its readers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("demux error: {0}")]
    Demux(#[from] DemuxError),

    #[error("session used after destroy")]
    Destroyed,

    #[error("session already destroyed")]
    AlreadyDestroyed,

    #[error("poll cancelled")]
    Cancelled,

    #[error("poll failed after {attempts} attempts: {source}")]
    RetryExhausted { attempts: u32, source: DemuxError },

    #[error("{0} queue closed")]
    ChannelClosed(TrackType),
}

impl SessionError {
    /// Underlying demux failure, if any.
    pub fn demux_error(&self) -> Option<&DemuxError> {
        match self {
            Self::Demux(e) | Self::RetryExhausted { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Whether the failed load belongs to a session that still accepts
    /// requests, so the caller may drop it and load something else.
    pub fn is_cancelable(&self) -> bool {
        match self {
            Self::Demux(e) | Self::RetryExhausted { source: e, .. } => e.is_resumable(),
            Self::Destroyed | Self::AlreadyDestroyed | Self::Cancelled | Self::ChannelClosed(_) => {
                false
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Demux(e) => !e.is_resumable(),
            Self::Destroyed | Self::AlreadyDestroyed | Self::ChannelClosed(_) => true,
            Self::Cancelled | Self::RetryExhausted { .. } => false,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
