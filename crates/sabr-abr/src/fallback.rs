use std::time::Duration;

/// Default exclusion window for a failing representation.
pub const DEFAULT_EXCLUSION: Duration = Duration::from_secs(60);

/// Classification of a failed media load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadErrorStatus {
    /// Server reported the segment does not exist (HTTP 404 or equivalent).
    NotFound,
    /// Any other HTTP status.
    Http(u16),
    /// Per-attempt timeout, retries exhausted.
    Timeout,
    /// Connection-level failure, retries exhausted.
    Transient,
    /// Malformed media from the demux boundary.
    Parse,
}

/// Identity and classification of a failed chunk load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadErrorInfo {
    /// Index of the failing representation within its adaptation set.
    pub representation: usize,
    /// `None` for initialization chunks.
    pub segment_number: Option<u64>,
    pub status: LoadErrorStatus,
    /// Whether the load failed while the session could still serve other
    /// requests. `false` once the session itself is gone or poisoned.
    pub cancelable: bool,
    /// Consecutive failures for this chunk, including this one.
    pub error_count: u32,
}

/// Snapshot of the track selection at the time of an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FallbackOptions {
    pub track_count: usize,
    pub excluded_track_count: usize,
}

impl FallbackOptions {
    /// At least one other representation would remain after excluding one.
    pub fn is_fallback_available(&self) -> bool {
        self.track_count.saturating_sub(self.excluded_track_count) > 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackDecision {
    ExcludeTrack(Duration),
    NoFallback,
}

/// Decides how a failed representation load is handled.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = FallbackPolicyMock)
)]
pub trait FallbackPolicy: Send + Sync {
    fn fallback_for(&self, options: &FallbackOptions, error: &LoadErrorInfo) -> FallbackDecision;
}

/// Excludes the failing representation for a fixed window while another
/// candidate remains. Parse errors and non-cancelable loads never fall back.
#[derive(Clone, Debug)]
pub struct DefaultFallbackPolicy {
    exclusion: Duration,
}

impl DefaultFallbackPolicy {
    pub fn new(exclusion: Duration) -> Self {
        Self { exclusion }
    }

    pub fn exclusion(&self) -> Duration {
        self.exclusion
    }
}

impl Default for DefaultFallbackPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUSION)
    }
}

impl FallbackPolicy for DefaultFallbackPolicy {
    fn fallback_for(&self, options: &FallbackOptions, error: &LoadErrorInfo) -> FallbackDecision {
        if !error.cancelable
            || error.status == LoadErrorStatus::Parse
            || !options.is_fallback_available()
        {
            return FallbackDecision::NoFallback;
        }
        FallbackDecision::ExcludeTrack(self.exclusion)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use unimock::{MockFn, Unimock, matching};

    use super::*;

    fn error(status: LoadErrorStatus) -> LoadErrorInfo {
        LoadErrorInfo {
            representation: 0,
            segment_number: Some(3),
            status,
            cancelable: true,
            error_count: 1,
        }
    }

    #[rstest]
    #[case(2, 0, true)]
    #[case(2, 1, false)]
    #[case(1, 0, false)]
    #[case(0, 0, false)]
    #[case(3, 1, true)]
    fn fallback_availability(
        #[case] track_count: usize,
        #[case] excluded_track_count: usize,
        #[case] expected: bool,
    ) {
        let options = FallbackOptions {
            track_count,
            excluded_track_count,
        };
        assert_eq!(options.is_fallback_available(), expected);
    }

    #[rstest]
    #[case::http_503(LoadErrorStatus::Http(503), 2, FallbackDecision::ExcludeTrack(DEFAULT_EXCLUSION))]
    #[case::timeout(LoadErrorStatus::Timeout, 2, FallbackDecision::ExcludeTrack(DEFAULT_EXCLUSION))]
    #[case::not_found(LoadErrorStatus::NotFound, 2, FallbackDecision::ExcludeTrack(DEFAULT_EXCLUSION))]
    #[case::parse(LoadErrorStatus::Parse, 2, FallbackDecision::NoFallback)]
    #[case::single_track(LoadErrorStatus::Http(500), 1, FallbackDecision::NoFallback)]
    fn default_policy(
        #[case] status: LoadErrorStatus,
        #[case] track_count: usize,
        #[case] expected: FallbackDecision,
    ) {
        let options = FallbackOptions {
            track_count,
            excluded_track_count: 0,
        };
        let policy = DefaultFallbackPolicy::default();
        assert_eq!(policy.fallback_for(&options, &error(status)), expected);
    }

    #[test]
    fn non_cancelable_load_never_falls_back() {
        let options = FallbackOptions {
            track_count: 3,
            excluded_track_count: 0,
        };
        let info = LoadErrorInfo {
            cancelable: false,
            ..error(LoadErrorStatus::Http(503))
        };
        assert_eq!(
            DefaultFallbackPolicy::default().fallback_for(&options, &info),
            FallbackDecision::NoFallback
        );
    }

    #[test]
    fn policy_can_be_mocked() {
        let policy = Unimock::new(
            FallbackPolicyMock::fallback_for
                .next_call(matching!(_, _))
                .returns(FallbackDecision::ExcludeTrack(Duration::from_millis(5000))),
        );
        let options = FallbackOptions {
            track_count: 2,
            excluded_track_count: 0,
        };
        assert_eq!(
            policy.fallback_for(&options, &error(LoadErrorStatus::Transient)),
            FallbackDecision::ExcludeTrack(Duration::from_millis(5000))
        );
    }
}
