use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use web_time::Instant;

use super::{AbrMode, AbrOptions, Estimator, ThroughputEstimator, ThroughputSample};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AbrReason {
    Initial,
    ManualOverride,
    UpSwitch,
    DownSwitch,
    /// Current representation is excluded; moved to the best live alternative.
    Fallback,
    MinInterval,
    NoEstimate,
    BufferTooLowForUpSwitch,
    AlreadyOptimal,
    /// Every representation is excluded.
    NoCandidate,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AbrDecision {
    pub target_variant_index: usize,
    pub reason: AbrReason,
    pub changed: bool,
}

impl AbrDecision {
    fn stay(current: usize, reason: AbrReason) -> Self {
        Self {
            target_variant_index: current,
            reason,
            changed: false,
        }
    }
}

/// Value indicating no switch has occurred yet.
const NO_SWITCH: u64 = 0;

pub struct AbrController<E: Estimator = ThroughputEstimator> {
    cfg: AbrOptions,
    current_variant: AtomicUsize,
    estimator: E,
    /// Nanoseconds since `reference_instant` of last switch, or `NO_SWITCH` if none.
    last_switch_at_nanos: AtomicU64,
    reference_instant: Instant,
}

impl<E: Estimator> AbrController<E> {
    pub fn with_estimator(cfg: AbrOptions, estimator: E) -> Self {
        let initial_variant = cfg.initial_variant();
        Self {
            cfg,
            current_variant: AtomicUsize::new(initial_variant),
            estimator,
            last_switch_at_nanos: AtomicU64::new(NO_SWITCH),
            reference_instant: Instant::now(),
        }
    }

    /// Nanos since reference; at least 1 to stay distinct from `NO_SWITCH`.
    #[expect(clippy::cast_possible_truncation)] // 585 years of nanos fit u64
    fn instant_to_nanos(&self, instant: Instant) -> u64 {
        let nanos = instant
            .saturating_duration_since(self.reference_instant)
            .as_nanos() as u64;
        nanos.max(1)
    }

    fn nanos_to_instant(&self, nanos: u64) -> Option<Instant> {
        (nanos != NO_SWITCH).then(|| self.reference_instant + Duration::from_nanos(nanos))
    }

    fn record_switch(&self, now: Instant) {
        self.last_switch_at_nanos
            .store(self.instant_to_nanos(now), Ordering::Release);
    }

    pub fn options(&self) -> &AbrOptions {
        &self.cfg
    }

    pub fn get_current_variant_index(&self) -> usize {
        self.current_variant.load(Ordering::Acquire)
    }

    pub fn push_throughput_sample(&mut self, sample: ThroughputSample) {
        self.estimator.push_sample(sample);
    }

    /// Reset buffer level (on seek).
    pub fn reset_buffer(&mut self) {
        self.estimator.reset_buffer();
    }

    /// Buffer level as loaded-until minus playback position.
    pub fn set_buffer_level(&mut self, buffered: Duration) {
        self.estimator.set_buffer_level_secs(buffered.as_secs_f64());
    }

    pub fn buffer_level_secs(&self) -> f64 {
        self.estimator.buffer_level_secs()
    }

    /// Chooses the representation for the next load.
    ///
    /// `is_live(i)` reports whether representation `i` is currently a
    /// candidate. An excluded current representation always yields a
    /// [`AbrReason::Fallback`] decision, regardless of mode or switch interval.
    #[expect(
        clippy::cognitive_complexity,
        reason = "ABR decision logic with multiple branches"
    )]
    pub fn decide(&self, now: Instant, is_live: impl Fn(usize) -> bool) -> AbrDecision {
        let current = self.current_variant.load(Ordering::Acquire);

        if let AbrMode::Manual(idx) = self.cfg.mode {
            if is_live(idx) {
                return AbrDecision {
                    target_variant_index: idx,
                    reason: AbrReason::ManualOverride,
                    changed: idx != current,
                };
            }
            return self.fallback_from(idx, current, &is_live);
        }

        if !is_live(current) {
            return self.fallback_from(current, current, &is_live);
        }

        let buffer_level_secs = self.buffer_level_secs();

        if !self.can_switch_now(now) {
            tracing::debug!(
                current,
                buffer_level_secs,
                "ABR decide: MinInterval not elapsed"
            );
            return AbrDecision::stay(current, AbrReason::MinInterval);
        }

        let Some(estimate_bps) = self.estimator.estimate_bps() else {
            tracing::debug!(current, buffer_level_secs, "ABR decide: NoEstimate");
            return AbrDecision::stay(current, AbrReason::NoEstimate);
        };

        let current_bw = self.cfg.bandwidth_of(current);

        let mut variants: Vec<(usize, u64)> = self
            .cfg
            .variants
            .iter()
            .filter(|v| is_live(v.variant_index))
            .map(|v| (v.variant_index, v.bandwidth_bps))
            .collect();
        variants.sort_by_key(|(_, bw)| *bw);

        // Divide, not multiply: the safety factor shrinks usable throughput.
        #[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
        let adjusted_bps = (estimate_bps as f64 / self.cfg.throughput_safety_factor).max(0.0);

        tracing::debug!(
            current,
            current_bw,
            estimate_bps,
            adjusted_bps,
            buffer_level_secs,
            candidates = variants.len(),
            "ABR decide: evaluating"
        );

        #[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
        let best_under = variants
            .iter()
            .filter(|(_, bw)| (*bw as f64) <= adjusted_bps)
            .max_by_key(|(_, bw)| *bw);

        let Some(&(candidate_idx, candidate_bw)) = best_under.or_else(|| variants.first()) else {
            return AbrDecision::stay(current, AbrReason::AlreadyOptimal);
        };

        if candidate_bw > current_bw {
            let buffer_ok = self.cfg.min_buffer_for_up_switch_secs <= 0.0
                || buffer_level_secs >= self.cfg.min_buffer_for_up_switch_secs;
            #[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
            let required_bps = (candidate_bw as f64) * self.cfg.up_hysteresis_ratio;
            let headroom_ok = adjusted_bps >= required_bps;
            tracing::debug!(
                buffer_ok,
                headroom_ok,
                adjusted_bps,
                required_bps,
                "ABR decide: up-switch check"
            );
            if buffer_ok && headroom_ok {
                self.record_switch(now);
                return AbrDecision {
                    target_variant_index: candidate_idx,
                    reason: AbrReason::UpSwitch,
                    changed: true,
                };
            }
            return AbrDecision::stay(current, AbrReason::BufferTooLowForUpSwitch);
        }

        if candidate_bw < current_bw {
            let urgent_down = buffer_level_secs <= self.cfg.down_switch_buffer_secs;
            #[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
            let margin_ok = adjusted_bps <= (current_bw as f64) * self.cfg.down_hysteresis_ratio;
            if urgent_down || margin_ok {
                self.record_switch(now);
                return AbrDecision {
                    target_variant_index: candidate_idx,
                    reason: AbrReason::DownSwitch,
                    changed: true,
                };
            }
        }

        AbrDecision::stay(current, AbrReason::AlreadyOptimal)
    }

    /// Highest live bandwidth not above `failing`, else the lowest live one.
    fn fallback_from(
        &self,
        failing: usize,
        current: usize,
        is_live: &impl Fn(usize) -> bool,
    ) -> AbrDecision {
        let failing_bw = self.cfg.bandwidth_of(failing);
        let live = || {
            self.cfg
                .variants
                .iter()
                .filter(|v| is_live(v.variant_index))
        };
        let target = live()
            .filter(|v| v.bandwidth_bps <= failing_bw)
            .max_by_key(|v| v.bandwidth_bps)
            .or_else(|| live().min_by_key(|v| v.bandwidth_bps));

        match target {
            Some(v) => {
                tracing::debug!(
                    failing,
                    target = v.variant_index,
                    "ABR decide: fallback from excluded representation"
                );
                AbrDecision {
                    target_variant_index: v.variant_index,
                    reason: AbrReason::Fallback,
                    changed: v.variant_index != current,
                }
            }
            None => {
                tracing::warn!(failing, "ABR decide: no live representation");
                AbrDecision::stay(current, AbrReason::NoCandidate)
            }
        }
    }

    pub fn apply(&mut self, decision: &AbrDecision, now: Instant) {
        let current = self.current_variant.load(Ordering::Acquire);
        if decision.target_variant_index == current {
            return;
        }
        self.current_variant
            .store(decision.target_variant_index, Ordering::Release);
        // Forced fallbacks do not restart the throughput switch interval.
        if decision.reason != AbrReason::Fallback {
            self.record_switch(now);
        }
    }

    fn can_switch_now(&self, now: Instant) -> bool {
        let nanos = self.last_switch_at_nanos.load(Ordering::Acquire);
        self.nanos_to_instant(nanos)
            .is_none_or(|t| now.saturating_duration_since(t) >= self.cfg.min_switch_interval)
    }
}

impl AbrController<ThroughputEstimator> {
    #[must_use]
    pub fn new(cfg: AbrOptions) -> Self {
        Self::with_estimator(cfg, ThroughputEstimator::new())
    }
}
