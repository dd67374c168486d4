//! Segment timing table for one representation.
//!
//! Times are microseconds from the start of the presentation. Segment
//! numbers are contiguous from 0.

use crate::IndexError;

/// Ordered segment start times and durations.
///
/// An empty index means the initialization chunk has not been loaded yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkIndex {
    starts_us: Vec<u64>,
    durations_us: Vec<u64>,
}

impl ChunkIndex {
    /// Builds an index, rejecting mismatched lengths and overlapping segments.
    pub fn new(starts_us: Vec<u64>, durations_us: Vec<u64>) -> Result<Self, IndexError> {
        if starts_us.len() != durations_us.len() {
            return Err(IndexError::LengthMismatch {
                starts: starts_us.len(),
                durations: durations_us.len(),
            });
        }
        for (n, pair) in (0u64..).zip(starts_us.windows(2)) {
            let prev_end = pair[0].saturating_add(durations_us[usize_of(n)]);
            if pair[1] < prev_end {
                return Err(IndexError::Overlap {
                    prev: n,
                    segment: n + 1,
                });
            }
        }
        Ok(Self {
            starts_us,
            durations_us,
        })
    }

    /// Back-to-back segments starting at 0.
    pub fn from_durations(durations_us: impl IntoIterator<Item = u64>) -> Self {
        let durations_us: Vec<u64> = durations_us.into_iter().collect();
        let starts_us = durations_us
            .iter()
            .scan(0u64, |t, d| {
                let start = *t;
                *t = t.saturating_add(*d);
                Some(start)
            })
            .collect();
        Self {
            starts_us,
            durations_us,
        }
    }

    /// `count` segments of equal duration.
    pub fn uniform(count: usize, segment_duration_us: u64) -> Self {
        Self::from_durations(std::iter::repeat_n(segment_duration_us, count))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of segments; 0 means "no index yet".
    pub fn segment_count(&self) -> u64 {
        self.starts_us.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.starts_us.is_empty()
    }

    pub fn first_segment_number(&self) -> u64 {
        0
    }

    pub fn last_available_segment_number(&self) -> Option<u64> {
        self.segment_count().checked_sub(1)
    }

    /// Segment containing `position_us`, clamped to `[0, last_available]`.
    ///
    /// Positions before the first start map to 0, positions past the end map
    /// to the last segment. Returns 0 for an empty index.
    pub fn segment_number_for(&self, position_us: u64) -> u64 {
        let after = self.starts_us.partition_point(|&s| s <= position_us);
        after.saturating_sub(1) as u64
    }

    pub fn segment_start_time_us(&self, n: u64) -> Option<u64> {
        self.starts_us.get(usize_of(n)).copied()
    }

    pub fn segment_duration_us(&self, n: u64) -> Option<u64> {
        self.durations_us.get(usize_of(n)).copied()
    }

    pub fn segment_end_time_us(&self, n: u64) -> Option<u64> {
        Some(
            self.segment_start_time_us(n)?
                .saturating_add(self.segment_duration_us(n)?),
        )
    }

    /// End of the last segment, 0 when empty.
    pub fn end_time_us(&self) -> u64 {
        self.last_available_segment_number()
            .and_then(|n| self.segment_end_time_us(n))
            .unwrap_or(0)
    }
}

fn usize_of(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
