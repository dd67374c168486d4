use std::io::{self, Read};

use bytes::{Bytes, BytesMut};
use sabr_manifest::{FormatId, TrackType};

use crate::ChunkIndex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// Container header plus the format's segment index.
    Init(ChunkIndex),
    Media,
}

/// One timed unit of encoded media for one track, as produced by the session.
///
/// The payload arrives as a list of buffers in the order the server sent
/// them; it is never concatenated unless the consumer asks for it.
#[derive(Clone, Debug)]
pub struct Segment {
    pub track: TrackType,
    pub format: FormatId,
    pub kind: SegmentKind,
    /// Segment number within the format; 0 for init segments.
    pub sequence_number: u64,
    pub duration_us: u64,
    pub data: Vec<Bytes>,
}

impl Segment {
    pub fn media(
        track: TrackType,
        format: FormatId,
        sequence_number: u64,
        duration_us: u64,
        data: Vec<Bytes>,
    ) -> Self {
        Self {
            track,
            format,
            kind: SegmentKind::Media,
            sequence_number,
            duration_us,
            data,
        }
    }

    pub fn init(track: TrackType, format: FormatId, index: ChunkIndex, data: Vec<Bytes>) -> Self {
        Self {
            track,
            format,
            kind: SegmentKind::Init(index),
            sequence_number: 0,
            duration_us: 0,
            data,
        }
    }

    pub fn is_init(&self) -> bool {
        matches!(self.kind, SegmentKind::Init(_))
    }

    pub fn index(&self) -> Option<&ChunkIndex> {
        match &self.kind {
            SegmentKind::Init(index) => Some(index),
            SegmentKind::Media => None,
        }
    }

    /// Total payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(Bytes::is_empty)
    }

    /// Payload as one contiguous buffer. Zero-copy for single-part segments.
    pub fn to_bytes(&self) -> Bytes {
        match self.data.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            parts => {
                let mut out = BytesMut::with_capacity(self.len());
                for part in parts {
                    out.extend_from_slice(part);
                }
                out.freeze()
            }
        }
    }

    pub fn cursor(&self) -> SegmentCursor {
        SegmentCursor::new(self.data.clone())
    }
}

/// Sequential reader over a segment's buffers without concatenating them.
#[derive(Clone, Debug)]
pub struct SegmentCursor {
    parts: Vec<Bytes>,
    part: usize,
    offset: usize,
}

impl SegmentCursor {
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self {
            parts,
            part: 0,
            offset: 0,
        }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.parts
            .iter()
            .skip(self.part)
            .map(Bytes::len)
            .sum::<usize>()
            .saturating_sub(self.offset)
    }
}

impl Read for SegmentCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            let Some(current) = self.parts.get(self.part) else {
                break;
            };
            let available = &current[self.offset..];
            if available.is_empty() {
                self.part += 1;
                self.offset = 0;
                continue;
            }
            let n = available.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&available[..n]);
            written += n;
            self.offset += n;
        }
        Ok(written)
    }
}
