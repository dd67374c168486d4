use sabr_manifest::{FormatId, Representation};
use sabr_stream::ChunkIndex;

/// A representation plus its chunk index once the init chunk has loaded.
#[derive(Clone, Debug)]
pub struct RepresentationHolder {
    representation: Representation,
    index: Option<ChunkIndex>,
}

impl RepresentationHolder {
    pub fn new(representation: Representation) -> Self {
        Self {
            representation,
            index: None,
        }
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn format_id(&self) -> &FormatId {
        &self.representation.format_id
    }

    pub fn index(&self) -> Option<&ChunkIndex> {
        self.index.as_ref()
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Populates the index. A populated index never changes; later calls
    /// are ignored and return `false`.
    pub fn set_index(&mut self, index: ChunkIndex) -> bool {
        if let Some(existing) = &self.index {
            if *existing != index {
                tracing::debug!(
                    format = %self.representation.format_id,
                    "ignoring replacement chunk index"
                );
            }
            return false;
        }
        tracing::trace!(
            format = %self.representation.format_id,
            segments = index.segment_count(),
            "chunk index populated"
        );
        self.index = Some(index);
        true
    }

    /// 0 when no index is loaded yet.
    pub fn segment_count(&self) -> u64 {
        self.index.as_ref().map_or(0, ChunkIndex::segment_count)
    }

    pub fn last_available_segment_number(&self) -> Option<u64> {
        self.index
            .as_ref()
            .and_then(ChunkIndex::last_available_segment_number)
    }

    pub fn segment_number_for(&self, position_us: u64) -> u64 {
        self.index
            .as_ref()
            .map_or(0, |i| i.segment_number_for(position_us))
    }

    pub fn segment_start_time_us(&self, n: u64) -> Option<u64> {
        self.index.as_ref()?.segment_start_time_us(n)
    }

    pub fn segment_end_time_us(&self, n: u64) -> Option<u64> {
        self.index.as_ref()?.segment_end_time_us(n)
    }
}
