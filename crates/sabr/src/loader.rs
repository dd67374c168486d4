use std::time::Duration;

use web_time::Instant;

use crate::SabrResult;

/// Snapshot of playback state handed to loaders.
#[derive(Clone, Copy, Debug)]
pub struct LoadingInfo {
    pub playback_position_us: u64,
    pub now: Instant,
}

impl LoadingInfo {
    pub fn new(playback_position_us: u64) -> Self {
        Self {
            playback_position_us,
            now: Instant::now(),
        }
    }
}

/// A loader whose progress is ordered by media time.
///
/// Positions are `None` once the loader has reached the end of its source.
pub trait SequenceableLoader {
    fn next_load_position_us(&self) -> Option<u64>;

    fn buffered_position_us(&self) -> Option<u64>;

    fn is_loading(&self) -> bool;

    /// Loads at most one unit. Returns whether any progress was made.
    fn continue_loading(&mut self, info: &LoadingInfo) -> SabrResult<bool>;

    fn reevaluate_buffer(&mut self, position_us: u64);
}

/// Arbitrates loading across several [`SequenceableLoader`]s.
///
/// Each pass lets the loaders furthest behind continue, plus any loader whose
/// next position is at or before playback. Passes repeat while some loader
/// makes progress. A loader more than `max_buffer` ahead of playback waits.
#[derive(Clone, Copy, Debug)]
pub struct CompositeLoader {
    max_buffer_us: u64,
}

impl CompositeLoader {
    pub fn new(max_buffer: Duration) -> Self {
        Self {
            max_buffer_us: u64::try_from(max_buffer.as_micros()).unwrap_or(u64::MAX),
        }
    }

    pub fn next_load_position_us(&self, loaders: &[&dyn SequenceableLoader]) -> Option<u64> {
        loaders.iter().filter_map(|l| l.next_load_position_us()).min()
    }

    pub fn buffered_position_us(&self, loaders: &[&dyn SequenceableLoader]) -> Option<u64> {
        loaders.iter().filter_map(|l| l.buffered_position_us()).min()
    }

    pub fn is_loading(&self, loaders: &[&dyn SequenceableLoader]) -> bool {
        loaders.iter().any(|l| l.is_loading())
    }

    pub fn reevaluate_buffer(&self, loaders: &mut [&mut dyn SequenceableLoader], position_us: u64) {
        for loader in loaders {
            loader.reevaluate_buffer(position_us);
        }
    }

    pub fn continue_loading(
        &self,
        loaders: &mut [&mut dyn SequenceableLoader],
        info: &LoadingInfo,
    ) -> SabrResult<bool> {
        let limit_us = info.playback_position_us.saturating_add(self.max_buffer_us);
        let mut made_progress = false;
        loop {
            let next = loaders.iter().filter_map(|l| l.next_load_position_us()).min();
            let Some(next_us) = next else {
                break;
            };
            if next_us >= limit_us {
                tracing::trace!(next_us, limit_us, "buffer full");
                break;
            }

            let mut progress_this_pass = false;
            for loader in loaders.iter_mut() {
                let Some(loader_next) = loader.next_load_position_us() else {
                    continue;
                };
                let behind = loader_next <= info.playback_position_us;
                if loader_next == next_us || behind {
                    progress_this_pass |= loader.continue_loading(info)?;
                }
            }

            made_progress |= progress_this_pass;
            if !progress_this_pass {
                break;
            }
        }
        Ok(made_progress)
    }
}
