use thiserror::Error;

/// Outcome of a single provider call that did not yield image bytes.
///
/// Adapters return these instead of opaque errors so the retry policy
/// can make retryable-vs-fatal a first-class decision rather than a
/// string match buried in a catch-all handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("authentication rejected")]
    Auth,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("response matched a known degraded-placeholder signature")]
    DegradedPlaceholder,
    #[error("empty response body")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderFailure {
    /// Fatal failures abandon the provider immediately, with no retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProviderFailure::Auth
                | ProviderFailure::MalformedRequest(_)
                | ProviderFailure::UnknownEndpoint(_)
        )
    }

    /// Rate-limit failures back off before the next attempt instead of
    /// retrying immediately.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderFailure::RateLimited(_))
    }

    /// Short label used in attempt records and logs.
    pub fn category(&self) -> &'static str {
        match self {
            ProviderFailure::Timeout => "timeout",
            ProviderFailure::RateLimited(_) => "rate-limited",
            ProviderFailure::Transport(_) => "transport",
            ProviderFailure::Http { .. } => "http",
            ProviderFailure::Auth => "auth",
            ProviderFailure::MalformedRequest(_) => "malformed-request",
            ProviderFailure::UnknownEndpoint(_) => "unknown-endpoint",
            ProviderFailure::DegradedPlaceholder => "degraded-placeholder",
            ProviderFailure::EmptyResponse => "empty-response",
            ProviderFailure::MalformedResponse(_) => "malformed-response",
        }
    }
}

/// Detects quota/rate-limit wording in provider error bodies that
/// arrive as plain text rather than a structured status.
pub fn looks_rate_limited(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    lowered.contains("rate limit")
        || lowered.contains("rate-limit")
        || lowered.contains("quota")
        || lowered.contains("too many requests")
}
