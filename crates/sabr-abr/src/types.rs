use std::time::Duration;

use web_time::Instant;

/// ABR mode selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbrMode {
    /// Automatic bitrate adaptation.
    /// Optionally specify initial representation index (defaults to 0).
    Auto(Option<usize>),
    /// Pinned representation. Exclusion still overrides the pin until it expires.
    Manual(usize),
}

impl Default for AbrMode {
    fn default() -> Self {
        Self::Auto(None)
    }
}

/// ABR configuration.
#[derive(Clone)]
pub struct AbrOptions {
    /// Hysteresis ratio for down-switch.
    pub down_hysteresis_ratio: f64,
    /// Buffer level (seconds) that triggers down-switch.
    pub down_switch_buffer_secs: f64,
    /// Minimum buffer level (seconds) required for up-switch.
    pub min_buffer_for_up_switch_secs: f64,
    /// Minimum interval between throughput-driven switches.
    pub min_switch_interval: Duration,
    pub mode: AbrMode,
    /// Safety factor for throughput estimation (1.5 means use 66% of the estimate).
    pub throughput_safety_factor: f64,
    /// Hysteresis ratio for up-switch (bandwidth must exceed target by this factor).
    pub up_hysteresis_ratio: f64,
    /// Representations of one adaptation set, filled in by [`crate::TrackSelection`].
    pub variants: Vec<Variant>,
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            down_hysteresis_ratio: 0.8,
            down_switch_buffer_secs: 5.0,
            min_buffer_for_up_switch_secs: 10.0,
            min_switch_interval: Duration::from_secs(30),
            mode: AbrMode::default(),
            throughput_safety_factor: 1.5,
            up_hysteresis_ratio: 1.3,
            variants: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AbrOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbrOptions")
            .field("down_hysteresis_ratio", &self.down_hysteresis_ratio)
            .field("down_switch_buffer_secs", &self.down_switch_buffer_secs)
            .field(
                "min_buffer_for_up_switch_secs",
                &self.min_buffer_for_up_switch_secs,
            )
            .field("min_switch_interval", &self.min_switch_interval)
            .field("mode", &self.mode)
            .field("throughput_safety_factor", &self.throughput_safety_factor)
            .field("up_hysteresis_ratio", &self.up_hysteresis_ratio)
            .field("variants", &self.variants.len())
            .finish()
    }
}

impl AbrOptions {
    /// Initial representation index based on mode.
    pub fn initial_variant(&self) -> usize {
        match self.mode {
            AbrMode::Auto(Some(idx)) | AbrMode::Manual(idx) => idx,
            AbrMode::Auto(None) => 0,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self.mode, AbrMode::Auto(_))
    }

    pub(crate) fn bandwidth_of(&self, index: usize) -> u64 {
        self.variants
            .iter()
            .find(|v| v.variant_index == index)
            .map_or(0, |v| v.bandwidth_bps)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThroughputSampleSource {
    Network,
    Cache,
}

#[derive(Clone, Copy, Debug)]
pub struct ThroughputSample {
    pub bytes: u64,
    pub duration: Duration,
    pub at: Instant,
    pub source: ThroughputSampleSource,
    /// Media duration carried by the sample, accumulated as buffer level.
    pub content_duration: Option<Duration>,
}

/// Bandwidth of one representation, keyed by its index in the adaptation set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Variant {
    pub variant_index: usize,
    pub bandwidth_bps: u64,
}
