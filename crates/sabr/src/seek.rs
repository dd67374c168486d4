/// How a requested seek position snaps to segment boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeekParameters {
    /// Seek to the exact position.
    Exact,
    /// Snap to the nearest boundary; ties go to the earlier one.
    #[default]
    ClosestSync,
    /// Snap to the boundary at or before the position.
    PreviousSync,
    /// Snap to the boundary at or after the position.
    NextSync,
}

impl SeekParameters {
    /// Resolves `position_us` given the sync points around it.
    ///
    /// `first_sync_us <= position_us`; `second_sync_us` is the next boundary,
    /// or equal to `first_sync_us` when there is none.
    pub fn resolve(self, position_us: u64, first_sync_us: u64, second_sync_us: u64) -> u64 {
        let has_second = second_sync_us > first_sync_us && second_sync_us >= position_us;
        match self {
            Self::Exact => position_us,
            Self::PreviousSync => first_sync_us,
            Self::NextSync if has_second => second_sync_us,
            Self::NextSync => first_sync_us,
            Self::ClosestSync if has_second => {
                if position_us.saturating_sub(first_sync_us) <= second_sync_us - position_us {
                    first_sync_us
                } else {
                    second_sync_us
                }
            }
            Self::ClosestSync => first_sync_us,
        }
    }
}
