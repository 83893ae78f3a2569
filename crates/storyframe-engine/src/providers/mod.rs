use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::StatusCode;
use storyframe_contracts::config::{ProviderKind, ProviderSpec};
use storyframe_contracts::failure::{looks_rate_limited, ProviderFailure};
use storyframe_contracts::payload::ImageBytes;

mod gradio;
mod hf_inference;
mod url_image;

pub use gradio::GradioSpaceProvider;
pub use hf_inference::HfInferenceProvider;
pub use url_image::UrlImageProvider;

/// One remote image source. Adapters construct the provider-specific
/// call, perform it, and normalize whatever shape comes back into
/// plain image bytes or a classified failure.
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(&self, prompt: &str, spec: &ProviderSpec) -> Result<ImageBytes, ProviderFailure>;
}

/// Builds the adapter matching a spec's kind.
pub fn provider_for_spec(spec: &ProviderSpec) -> Result<Box<dyn ImageProvider>> {
    Ok(match spec.kind {
        ProviderKind::HfInference => Box::new(HfInferenceProvider::new(spec)?),
        ProviderKind::GradioSpace => Box::new(GradioSpaceProvider::new(spec)?),
        ProviderKind::UrlImage => Box::new(UrlImageProvider::new(spec)?),
    })
}

pub(crate) fn http_client(timeout: Duration) -> Result<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

pub(crate) fn failure_from_request_error(err: &reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        return ProviderFailure::Timeout;
    }
    ProviderFailure::Transport(err.to_string())
}

/// Maps a non-success status and body into the failure taxonomy.
pub(crate) fn failure_from_status(status: StatusCode, body: String) -> ProviderFailure {
    match status.as_u16() {
        401 | 403 => ProviderFailure::Auth,
        404 => ProviderFailure::UnknownEndpoint(truncate(&body, 256)),
        429 => ProviderFailure::RateLimited(truncate(&body, 256)),
        400 | 422 => ProviderFailure::MalformedRequest(truncate(&body, 256)),
        _ => {
            if looks_rate_limited(&body) {
                return ProviderFailure::RateLimited(truncate(&body, 256));
            }
            ProviderFailure::Http {
                status: status.as_u16(),
                body: truncate(&body, 256),
            }
        }
    }
}

pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use storyframe_contracts::failure::ProviderFailure;

    use super::failure_from_status;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            failure_from_status(StatusCode::UNAUTHORIZED, String::new()),
            ProviderFailure::Auth
        );
        assert_eq!(
            failure_from_status(StatusCode::FORBIDDEN, String::new()),
            ProviderFailure::Auth
        );
        assert!(matches!(
            failure_from_status(StatusCode::NOT_FOUND, "missing".to_string()),
            ProviderFailure::UnknownEndpoint(_)
        ));
        assert!(matches!(
            failure_from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderFailure::RateLimited(_)
        ));
        assert!(matches!(
            failure_from_status(StatusCode::BAD_REQUEST, "bad prompt".to_string()),
            ProviderFailure::MalformedRequest(_)
        ));
        assert!(matches!(
            failure_from_status(StatusCode::SERVICE_UNAVAILABLE, "warming up".to_string()),
            ProviderFailure::Http { status: 503, .. }
        ));
    }

    #[test]
    fn quota_wording_in_5xx_body_is_reclassified() {
        assert!(matches!(
            failure_from_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                "monthly quota exceeded".to_string()
            ),
            ProviderFailure::RateLimited(_)
        ));
    }
}
