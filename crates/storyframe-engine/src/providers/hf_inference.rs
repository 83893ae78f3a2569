use anyhow::Result;
use reqwest::blocking::Client as HttpClient;
use serde_json::json;
use storyframe_contracts::config::ProviderSpec;
use storyframe_contracts::failure::ProviderFailure;
use storyframe_contracts::payload::{ImageBytes, MediaType};

use super::{failure_from_request_error, failure_from_status, http_client};

/// Authenticated inference API adapter. The call is a JSON POST whose
/// success body is the raw image byte stream.
pub struct HfInferenceProvider {
    http: HttpClient,
}

impl HfInferenceProvider {
    pub fn new(spec: &ProviderSpec) -> Result<Self> {
        Ok(Self {
            http: http_client(spec.timeout)?,
        })
    }

    fn endpoint(spec: &ProviderSpec) -> String {
        format!("{}/models/{}", spec.base_url, spec.model)
    }
}

impl super::ImageProvider for HfInferenceProvider {
    fn name(&self) -> &str {
        "hf-inference"
    }

    fn invoke(&self, prompt: &str, spec: &ProviderSpec) -> Result<ImageBytes, ProviderFailure> {
        let Some(token) = spec.token.as_deref() else {
            return Err(ProviderFailure::Auth);
        };

        let payload = json!({
            "inputs": prompt,
            "parameters": {
                "negative_prompt": spec.negative_prompt,
                "width": spec.width,
                "height": spec.height,
                "guidance_scale": spec.guidance_scale,
                "num_inference_steps": spec.steps,
            },
        });

        let response = self
            .http
            .post(Self::endpoint(spec))
            .bearer_auth(token)
            .header("Accept", "image/*")
            .json(&payload)
            .send()
            .map_err(|err| failure_from_request_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(failure_from_status(status, body));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|err| failure_from_request_error(&err))?
            .to_vec();
        if bytes.is_empty() {
            return Err(ProviderFailure::EmptyResponse);
        }

        let media_type = content_type
            .as_deref()
            .and_then(MediaType::from_mime)
            .or_else(|| MediaType::sniff(&bytes))
            .unwrap_or(spec.media_type);

        Ok(ImageBytes {
            bytes,
            media_type,
            source_url: None,
        })
    }
}
