//! Gateway-wide error taxonomy.
//!
//! Every fallible path in the gateway returns [`GatewayError`]. Variants map
//! 1:1 onto the error codes in the routing pipeline's error taxonomy; the
//! ingress layer is responsible for turning a `GatewayError` into an HTTP
//! status and a structured JSON body.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Malformed or invalid request body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Caller's rate-limit bucket is empty.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Embedding requested against an adapter that cannot embed.
    #[error("capability unsupported: {0}")]
    CapabilityUnsupported(String),

    /// The candidate list was empty at invocation time.
    #[error("no providers available: {0}")]
    NoProvidersAvailable(String),

    /// Per-attempt timeout elapsed waiting on an upstream.
    #[error("upstream timeout ({provider}): {message}")]
    UpstreamTimeout { provider: String, message: String },

    /// Connection refused/reset talking to an upstream.
    #[error("upstream transport error ({provider}): {message}")]
    UpstreamTransport { provider: String, message: String },

    /// Upstream returned a 5xx.
    #[error("upstream server error ({provider}): {message}")]
    UpstreamServerError { provider: String, message: String },

    /// Upstream returned 429.
    #[error("upstream throttled ({provider}): {message}")]
    UpstreamThrottled { provider: String, message: String },

    /// Upstream returned a non-429 4xx.
    #[error("upstream client error ({provider}): {message}")]
    UpstreamClientError { provider: String, message: String },

    /// Circuit breaker is open for this provider.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Anything else gone wrong.
    #[error("internal error: {0}")]
    Internal(String),

    /// Config failed validation at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// The coarse, HTTP-facing category surfaced in the error body's `type`
    /// field. `code` (below) carries the fine-grained taxonomy value;
    /// `type` only ever takes one of these three values.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::CapabilityUnsupported(_) => {
                "invalid_request_error"
            }
            GatewayError::RateLimitExceeded(_) => "rate_limit_error",
            _ => "api_error",
        }
    }

    /// The fine-grained taxonomy code surfaced in the HTTP error body's
    /// `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request_error",
            GatewayError::RateLimitExceeded(_) => "rate_limit_exceeded",
            GatewayError::CapabilityUnsupported(_) => "capability_unsupported",
            GatewayError::NoProvidersAvailable(_) => "no_providers_available",
            GatewayError::UpstreamTimeout { .. } => "upstream_timeout",
            GatewayError::UpstreamTransport { .. } => "upstream_transport",
            GatewayError::UpstreamServerError { .. } => "upstream_server_error",
            GatewayError::UpstreamThrottled { .. } => "upstream_throttled",
            GatewayError::UpstreamClientError { .. } => "upstream_client_error",
            GatewayError::ProviderUnavailable(_) => "provider_unavailable",
            GatewayError::Config(_) => "internal_error",
            GatewayError::Serialization(_) => "internal_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// Whether the router should retry the same candidate for this error.
    ///
    /// Structural classification first (the variant itself says whether it's
    /// transient); falls back to a substring match on the message for
    /// adapters that could only surface a generic error. The substring rule
    /// is kept deliberately narrow — see DESIGN.md for why it wasn't dropped
    /// entirely.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::UpstreamTimeout { .. }
            | GatewayError::UpstreamTransport { .. }
            | GatewayError::UpstreamServerError { .. }
            | GatewayError::UpstreamThrottled { .. } => true,

            GatewayError::InvalidRequest(_)
            | GatewayError::RateLimitExceeded(_)
            | GatewayError::CapabilityUnsupported(_)
            | GatewayError::NoProvidersAvailable(_)
            | GatewayError::UpstreamClientError { .. }
            | GatewayError::Config(_) => false,

            // A breaker-short-circuited call participates in fallback, not retry.
            GatewayError::ProviderUnavailable(_) => false,

            GatewayError::Serialization(_) | GatewayError::Internal(_) => {
                Self::message_looks_retryable(&self.to_string())
            }
        }
    }

    fn message_looks_retryable(message: &str) -> bool {
        let lower = message.to_ascii_lowercase();
        ["timeout", "connection", "502", "503", "504", "429"]
            .iter()
            .any(|needle| lower.contains(needle))
    }

    /// The provider name this error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            GatewayError::UpstreamTimeout { provider, .. }
            | GatewayError::UpstreamTransport { provider, .. }
            | GatewayError::UpstreamServerError { provider, .. }
            | GatewayError::UpstreamThrottled { provider, .. }
            | GatewayError::UpstreamClientError { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(e: serde_yaml::Error) -> Self {
        GatewayError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::UpstreamTimeout {
                provider: "unknown".to_string(),
                message: e.to_string(),
            }
        } else if e.is_connect() {
            GatewayError::UpstreamTransport {
                provider: "unknown".to_string(),
                message: e.to_string(),
            }
        } else {
            GatewayError::Internal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_retryable() {
        assert!(GatewayError::UpstreamTimeout {
            provider: "openai".into(),
            message: "timed out".into()
        }
        .is_retryable());
        assert!(GatewayError::UpstreamThrottled {
            provider: "openai".into(),
            message: "429".into()
        }
        .is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!GatewayError::UpstreamClientError {
            provider: "openai".into(),
            message: "bad request".into()
        }
        .is_retryable());
    }

    #[test]
    fn breaker_open_is_not_retryable_but_is_fallback_eligible() {
        let err = GatewayError::ProviderUnavailable("circuit open".into());
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "provider_unavailable");
    }

    #[test]
    fn kind_collapses_fine_codes_into_three_coarse_categories() {
        assert_eq!(
            GatewayError::InvalidRequest("bad".into()).kind(),
            "invalid_request_error"
        );
        assert_eq!(
            GatewayError::CapabilityUnsupported("no embed".into()).kind(),
            "invalid_request_error"
        );
        assert_eq!(
            GatewayError::RateLimitExceeded("busy".into()).kind(),
            "rate_limit_error"
        );
        assert_eq!(
            GatewayError::NoProvidersAvailable("empty".into()).kind(),
            "api_error"
        );
        assert_eq!(
            GatewayError::UpstreamServerError {
                provider: "openai".into(),
                message: "503".into()
            }
            .kind(),
            "api_error"
        );
    }

    #[test]
    fn substring_fallback_catches_unclassified_timeouts() {
        let err = GatewayError::Internal("upstream said: connection reset".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn substring_fallback_does_not_catch_unrelated_internal_errors() {
        let err = GatewayError::Internal("unexpected null pointer".into());
        assert!(!err.is_retryable());
    }
}
