//! Provider response value objects

use serde::{Deserialize, Serialize};

use crate::core::provider::ProviderId;

/// Why a provider produced no usable text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The provider did not answer before its deadline (or the request deadline)
    Timeout,
    /// Transport-level or non-success HTTP failure
    Http(String),
    /// The provider answered with something that could not be interpreted
    Protocol(String),
    /// Skipped: the provider's rate limit was exhausted
    RateLimited,
    /// Skipped: the provider's circuit breaker is open
    CircuitOpen,
}

impl ProviderErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Http(_) => "http",
            Self::Protocol(_) => "protocol",
            Self::RateLimited => "rate_limited",
            Self::CircuitOpen => "circuit_open",
        }
    }

    /// Whether the provider was never actually invoked
    pub fn is_admission_denial(&self) -> bool {
        matches!(self, Self::RateLimited | Self::CircuitOpen)
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(detail) | Self::Protocol(detail) => write!(f, "{}: {}", self.code(), detail),
            _ => write!(f, "{}", self.code()),
        }
    }
}

/// Response from a single provider for one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The provider that produced (or failed to produce) this response
    pub provider_id: ProviderId,
    /// The raw answer text (empty on failure)
    pub text: String,
    /// Wall-clock time spent on this provider, in milliseconds
    pub latency_ms: u64,
    /// Failure classification, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderErrorKind>,
    /// Self-reported confidence in `[0, 1]`, when the provider supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ProviderResponse {
    /// Creates a successful response.
    pub fn success(provider_id: ProviderId, text: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            provider_id,
            text: text.into(),
            latency_ms,
            error: None,
            confidence: None,
        }
    }

    /// Creates a failed response.
    pub fn failure(provider_id: ProviderId, error: ProviderErrorKind, latency_ms: u64) -> Self {
        Self {
            provider_id,
            text: String::new(),
            latency_ms,
            error: Some(error),
            confidence: None,
        }
    }

    /// Attaches a self-reported confidence, clamped to `[0, 1]`.
    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0));
        self
    }

    /// A usable response has no error and non-blank text.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.text.trim().is_empty()
    }
}

/// Reason code when no provider produced a usable response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultReason {
    AllProvidersTimedOut,
    AllProvidersRateLimited,
    AllProvidersErrored,
}

impl EmptyResultReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllProvidersTimedOut => "all_providers_timed_out",
            Self::AllProvidersRateLimited => "all_providers_rate_limited",
            Self::AllProvidersErrored => "all_providers_errored",
        }
    }
}

impl std::fmt::Display for EmptyResultReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Classify a response set with zero usable responses.
///
/// Returns `None` when at least one response succeeded. Admission denials
/// (rate limit, open circuit) count together as rate limiting; any mix of
/// outcomes that is neither all-timeout nor all-denied is `AllProvidersErrored`.
pub fn classify_empty_result<'a, I>(responses: I) -> Option<EmptyResultReason>
where
    I: IntoIterator<Item = &'a ProviderResponse>,
{
    let mut total = 0usize;
    let mut timeouts = 0usize;
    let mut denials = 0usize;

    for response in responses {
        if response.is_success() {
            return None;
        }
        total += 1;
        match &response.error {
            Some(ProviderErrorKind::Timeout) => timeouts += 1,
            Some(kind) if kind.is_admission_denial() => denials += 1,
            _ => {}
        }
    }

    Some(if total > 0 && timeouts == total {
        EmptyResultReason::AllProvidersTimedOut
    } else if total > 0 && denials == total {
        EmptyResultReason::AllProvidersRateLimited
    } else {
        EmptyResultReason::AllProvidersErrored
    })
}
