#[cfg(test)]
use unimock::unimock;

use super::{ThroughputSample, ThroughputSampleSource};

/// Throughput estimation strategy used by [`crate::AbrController`].
#[cfg_attr(test, unimock(api = EstimatorMock))]
pub trait Estimator {
    /// Estimated throughput in bits per second.
    fn estimate_bps(&self) -> Option<u64>;

    fn push_sample(&mut self, sample: ThroughputSample);

    /// Buffered content duration in seconds.
    fn buffer_level_secs(&self) -> f64;

    /// Replaces the buffer level with one measured against playback.
    fn set_buffer_level_secs(&mut self, secs: f64);

    fn reset_buffer(&mut self);
}

/// Dual-EWMA estimator: the pessimistic minimum of a fast and a slow average.
#[derive(Clone, Debug)]
pub struct ThroughputEstimator {
    fast_ewma: Ewma,
    slow_ewma: Ewma,
    bytes_sampled: u64,
    buffered_content_secs: f64,
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputEstimator {
    const FAST_HALF_LIFE_SECS: f64 = 2.0;
    const SLOW_HALF_LIFE_SECS: f64 = 10.0;
    // Media chunks below this size are dominated by request latency.
    const MIN_CHUNK_BYTES: u64 = 16_000;
    const MIN_DURATION_MS: f64 = 0.5;

    pub fn new() -> Self {
        Self {
            fast_ewma: Ewma::new(Self::FAST_HALF_LIFE_SECS),
            slow_ewma: Ewma::new(Self::SLOW_HALF_LIFE_SECS),
            bytes_sampled: 0,
            buffered_content_secs: 0.0,
        }
    }

    pub fn bytes_sampled(&self) -> u64 {
        self.bytes_sampled
    }
}

impl Estimator for ThroughputEstimator {
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // estimate is positive
    fn estimate_bps(&self) -> Option<u64> {
        let est = self
            .fast_ewma
            .get_estimate()
            .min(self.slow_ewma.get_estimate());
        (est > 0.0).then(|| est.round() as u64)
    }

    #[expect(clippy::cast_precision_loss)] // byte counts well below 2^52
    fn push_sample(&mut self, sample: ThroughputSample) {
        if let Some(content_duration) = sample.content_duration {
            self.buffered_content_secs += content_duration.as_secs_f64();
        }

        if sample.source != ThroughputSampleSource::Network || sample.bytes < Self::MIN_CHUNK_BYTES {
            return;
        }

        let dur_ms = (sample.duration.as_secs_f64() * 1000.0).max(Self::MIN_DURATION_MS);
        let bps = (sample.bytes as f64) * 8000.0 / dur_ms;
        let weight_secs = dur_ms / 1000.0;

        self.fast_ewma.add_sample(weight_secs, bps);
        self.slow_ewma.add_sample(weight_secs, bps);
        self.bytes_sampled = self.bytes_sampled.saturating_add(sample.bytes);
    }

    fn buffer_level_secs(&self) -> f64 {
        self.buffered_content_secs
    }

    fn set_buffer_level_secs(&mut self, secs: f64) {
        self.buffered_content_secs = secs.max(0.0);
    }

    fn reset_buffer(&mut self) {
        self.buffered_content_secs = 0.0;
    }
}

#[derive(Clone, Debug)]
struct Ewma {
    alpha: f64,
    last_estimate: f64,
    total_weight: f64,
}

impl Ewma {
    fn new(half_life_secs: f64) -> Self {
        Self {
            alpha: f64::exp(0.5_f64.ln() / half_life_secs.max(0.001)),
            last_estimate: 0.0,
            total_weight: 0.0,
        }
    }

    fn add_sample(&mut self, weight: f64, val: f64) {
        let adj_alpha = self.alpha.powf(weight.max(0.0));
        self.last_estimate = val * (1.0 - adj_alpha) + adj_alpha * self.last_estimate;
        self.total_weight += weight.max(0.0);
    }

    fn get_estimate(&self) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let zero_factor = 1.0 - self.alpha.powf(self.total_weight);
        self.last_estimate / zero_factor.max(1e-6)
    }
}
