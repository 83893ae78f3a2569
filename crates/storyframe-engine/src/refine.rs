use anyhow::Result;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use storyframe_contracts::config::RefinerConfig;

use crate::providers::http_client;

const REFINE_INSTRUCTION: &str = "Rewrite the following passage as a single-paragraph visual \
     description suitable for an illustrator. Describe only what is visible. Reply with the \
     description alone.";

/// Optional prompt rewrite step. Implementations return `None` on any
/// failure; the caller then uses the untouched raw prompt, so this
/// step can never abort a request.
pub trait PromptRefiner: Send + Sync {
    fn refine(&self, raw: &str) -> Option<String>;
}

/// Chat-completions text provider used for the rewrite.
pub struct HttpPromptRefiner {
    http: HttpClient,
    config: RefinerConfig,
}

impl HttpPromptRefiner {
    pub fn new(config: RefinerConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(config.timeout)?,
            config,
        })
    }

    fn request_refinement(&self, raw: &str) -> Option<String> {
        let endpoint = format!("{}/chat/completions", self.config.base_url);
        let mut request = self.http.post(&endpoint).json(&json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": format!("{REFINE_INSTRUCTION}\n\n{raw}") }
            ],
            "max_tokens": 300,
        }));
        if let Some(token) = self.config.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        let payload: Value = response.json().ok()?;
        payload
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}

impl PromptRefiner for HttpPromptRefiner {
    fn refine(&self, raw: &str) -> Option<String> {
        let refined = self.request_refinement(raw);
        if refined.is_none() {
            tracing::debug!("prompt refinement unavailable, using raw prompt");
        }
        refined
    }
}
