use std::{sync::Arc, time::Duration};

pub use sabr_abr::{AbrMode, AbrOptions};
use sabr_abr::{DEFAULT_EXCLUSION, DefaultFallbackPolicy, FallbackPolicy};
use sabr_events::EventBus;
use sabr_stream::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::SeekParameters;

/// Configuration for one SABR playback.
#[derive(Clone)]
pub struct SabrConfig {
    /// ABR configuration applied to every adaptation set.
    pub abr: AbrOptions,
    /// Cancellation token stopping all session polling.
    pub cancel: Option<CancellationToken>,
    /// Capacity of the events broadcast channel (used when `events` is not provided).
    pub events_channel_capacity: usize,
    /// Event bus (optional - if not provided, one is created internally).
    pub events: Option<EventBus>,
    /// Exclusion window used by the default fallback policy.
    pub exclusion_duration: Duration,
    /// Overrides the default fallback policy.
    pub fallback_policy: Option<Arc<dyn FallbackPolicy>>,
    /// Loading stops once a stream is this far ahead of playback.
    pub max_buffer_duration: Duration,
    /// Per-attempt deadline handed to the native session.
    pub request_timeout: Duration,
    /// Backoff for transient session failures.
    pub retry: RetryPolicy,
    /// How seek targets snap to segment boundaries.
    pub seek: SeekParameters,
}

impl Default for SabrConfig {
    fn default() -> Self {
        Self {
            abr: AbrOptions::default(),
            cancel: None,
            events_channel_capacity: 32,
            events: None,
            exclusion_duration: DEFAULT_EXCLUSION,
            fallback_policy: None,
            max_buffer_duration: Duration::from_secs(50),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            seek: SeekParameters::default(),
        }
    }
}

impl std::fmt::Debug for SabrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SabrConfig")
            .field("abr", &self.abr)
            .field("cancel", &self.cancel.is_some())
            .field("events_channel_capacity", &self.events_channel_capacity)
            .field("exclusion_duration", &self.exclusion_duration)
            .field(
                "fallback_policy",
                &self.fallback_policy.as_ref().map(|_| "FallbackPolicy"),
            )
            .field("max_buffer_duration", &self.max_buffer_duration)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("seek", &self.seek)
            .finish_non_exhaustive()
    }
}

impl SabrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_abr(mut self, abr: AbrOptions) -> Self {
        self.abr = abr;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_exclusion_duration(mut self, duration: Duration) -> Self {
        self.exclusion_duration = duration;
        self
    }

    #[must_use]
    pub fn with_fallback_policy(mut self, policy: Arc<dyn FallbackPolicy>) -> Self {
        self.fallback_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn with_max_buffer_duration(mut self, duration: Duration) -> Self {
        self.max_buffer_duration = duration;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_seek_parameters(mut self, seek: SeekParameters) -> Self {
        self.seek = seek;
        self
    }

    pub(crate) fn fallback_policy(&self) -> Arc<dyn FallbackPolicy> {
        self.fallback_policy.clone().unwrap_or_else(|| {
            Arc::new(DefaultFallbackPolicy::new(self.exclusion_duration)) as Arc<dyn FallbackPolicy>
        })
    }

    pub(crate) fn event_bus(&self) -> EventBus {
        self.events
            .clone()
            .unwrap_or_else(|| EventBus::new(self.events_channel_capacity))
    }

    /// Child of the configured token, so releasing one period never cancels
    /// the caller's token.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token)
    }
}
