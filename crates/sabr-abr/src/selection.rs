use std::time::Duration;

use web_time::Instant;

use crate::{
    AbrController, AbrDecision, AbrOptions, Estimator, FallbackOptions, ThroughputEstimator,
    ThroughputSample, Variant,
};

/// Candidacy of one representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepresentationState {
    Candidate,
    Excluded { until: Instant },
}

/// Selected representation of one adaptation set, plus exclusion deadlines.
///
/// A representation is excluded until its deadline passes; it then returns to
/// candidacy without any further call. Excluding the last live candidate is
/// refused so the selection always has something to play.
pub struct TrackSelection<E: Estimator = ThroughputEstimator> {
    controller: AbrController<E>,
    excluded_until: Vec<Option<Instant>>,
}

impl TrackSelection<ThroughputEstimator> {
    /// `bandwidths[i]` is the bitrate of representation `i`.
    pub fn new(bandwidths: &[u64], options: AbrOptions) -> Self {
        Self::with_estimator(bandwidths, options, ThroughputEstimator::new())
    }
}

impl<E: Estimator> TrackSelection<E> {
    pub fn with_estimator(bandwidths: &[u64], mut options: AbrOptions, estimator: E) -> Self {
        options.variants = bandwidths
            .iter()
            .enumerate()
            .map(|(variant_index, &bandwidth_bps)| Variant {
                variant_index,
                bandwidth_bps,
            })
            .collect();
        Self {
            controller: AbrController::with_estimator(options, estimator),
            excluded_until: vec![None; bandwidths.len()],
        }
    }

    pub fn length(&self) -> usize {
        self.excluded_until.len()
    }

    pub fn selected_index(&self) -> usize {
        self.controller.get_current_variant_index()
    }

    pub fn is_excluded(&self, index: usize, now: Instant) -> bool {
        matches!(self.state(index, now), RepresentationState::Excluded { .. })
    }

    pub fn state(&self, index: usize, now: Instant) -> RepresentationState {
        match self.excluded_until.get(index).copied().flatten() {
            Some(until) if now < until => RepresentationState::Excluded { until },
            _ => RepresentationState::Candidate,
        }
    }

    fn live_count(&self, now: Instant) -> usize {
        (0..self.length())
            .filter(|&i| !self.is_excluded(i, now))
            .count()
    }

    /// Excludes `index` until `now + duration`.
    ///
    /// Returns `false` and leaves state unchanged when no other candidate
    /// would remain. An existing later deadline is kept.
    pub fn exclude(&mut self, index: usize, duration: Duration, now: Instant) -> bool {
        if index >= self.length() {
            return false;
        }
        let others_live = (0..self.length())
            .filter(|&i| i != index && !self.is_excluded(i, now))
            .count();
        if others_live == 0 {
            tracing::warn!(index, "refusing to exclude last live representation");
            return false;
        }

        let until = now + duration;
        let slot = &mut self.excluded_until[index];
        *slot = Some(slot.map_or(until, |existing| existing.max(until)));
        tracing::debug!(index, ?duration, "representation excluded");
        true
    }

    /// Copies exclusion deadlines from `other` for indices both share.
    pub fn inherit_exclusions<F: Estimator>(&mut self, other: &TrackSelection<F>) {
        for (slot, until) in self.excluded_until.iter_mut().zip(&other.excluded_until) {
            *slot = *until;
        }
    }

    pub fn fallback_options(&self, now: Instant) -> FallbackOptions {
        let track_count = self.length();
        FallbackOptions {
            track_count,
            excluded_track_count: track_count - self.live_count(now),
        }
    }

    /// Re-evaluates the selection against current exclusions and throughput.
    pub fn update_selected_track(&mut self, now: Instant) -> AbrDecision {
        let decision = {
            let excluded = &self.excluded_until;
            self.controller.decide(now, |i| {
                excluded
                    .get(i)
                    .is_some_and(|until| until.is_none_or(|t| now >= t))
            })
        };
        if decision.changed {
            tracing::debug!(
                from = self.selected_index(),
                to = decision.target_variant_index,
                reason = ?decision.reason,
                "selection changed"
            );
        }
        self.controller.apply(&decision, now);
        decision
    }

    pub fn push_throughput_sample(&mut self, sample: ThroughputSample) {
        self.controller.push_throughput_sample(sample);
    }

    /// Media loaded ahead of playback; read by the next
    /// [`update_selected_track`](Self::update_selected_track).
    pub fn set_buffered_duration(&mut self, buffered: Duration) {
        self.controller.set_buffer_level(buffered);
    }

    pub fn buffer_level_secs(&self) -> f64 {
        self.controller.buffer_level_secs()
    }

    pub fn reset_buffer(&mut self) {
        self.controller.reset_buffer();
    }
}
