//! Provider-cascade image acquisition: transforms a raw text prompt
//! into provider-specific requests, walks a fixed-priority cascade of
//! unreliable remote providers under per-provider retry policies, and
//! guarantees a response even fully offline via a locally generated
//! placeholder.

use anyhow::Result;
use storyframe_contracts::config::CascadeConfig;
use storyframe_contracts::payload::GenerateResponse;

pub mod cascade;
pub mod encode;
pub mod fallback;
pub mod prompt;
pub mod providers;
pub mod refine;
pub mod retry;

pub use cascade::{CascadeEntry, CascadeReport, Disposition, Orchestrator};
pub use encode::{decode_data_uri, ResponseEncoder};
pub use providers::ImageProvider;
pub use refine::{HttpPromptRefiner, PromptRefiner};
pub use retry::{RetryDecision, RetryPolicy};

/// The engine behind one deployment: a configured cascade plus the
/// response encoder. Construction is fallible (HTTP clients); request
/// handling is not.
pub struct IllustrationEngine {
    orchestrator: Orchestrator,
    encoder: ResponseEncoder,
}

impl IllustrationEngine {
    pub fn new(config: CascadeConfig) -> Result<Self> {
        let mut entries = Vec::with_capacity(config.providers.len());
        for spec in config.providers {
            let provider = providers::provider_for_spec(&spec)?;
            entries.push(CascadeEntry::new(spec, provider));
        }

        let refiner: Option<Box<dyn PromptRefiner>> = if config.refiner.enabled {
            Some(Box::new(HttpPromptRefiner::new(config.refiner)?))
        } else {
            None
        };

        Ok(Self {
            orchestrator: Orchestrator::new(
                entries,
                config.fallback_width,
                config.fallback_height,
                refiner,
            ),
            encoder: ResponseEncoder::new(config.encoder_mode),
        })
    }

    /// Handles one request end to end. Always yields a payload: a real
    /// image, a placeholder, or an explicit null.
    pub fn generate(&self, raw_prompt: &str) -> GenerateResponse {
        let report = self.orchestrator.run(raw_prompt);
        self.encoder.encode(report.result.as_ref())
    }

    /// Like [`generate`](Self::generate), but exposes the attempt log
    /// and disposition for diagnostics.
    pub fn generate_with_report(&self, raw_prompt: &str) -> (GenerateResponse, CascadeReport) {
        let report = self.orchestrator.run(raw_prompt);
        let response = self.encoder.encode(report.result.as_ref());
        (response, report)
    }
}

#[cfg(test)]
mod tests {
    use storyframe_contracts::config::{CascadeConfig, EncoderMode, RefinerConfig};

    use super::{Disposition, IllustrationEngine};

    fn offline_config() -> CascadeConfig {
        CascadeConfig {
            providers: Vec::new(),
            fallback_width: 96,
            fallback_height: 96,
            encoder_mode: EncoderMode::InlineDataUri,
            refiner: RefinerConfig {
                enabled: false,
                base_url: "http://localhost".to_string(),
                model: "none".to_string(),
                token: None,
                timeout: std::time::Duration::from_secs(1),
            },
        }
    }

    #[test]
    fn engine_with_no_providers_still_answers_with_placeholder() {
        let engine = IllustrationEngine::new(offline_config()).unwrap();
        let (response, report) = engine.generate_with_report("a quiet harbor at dusk");
        assert_eq!(report.disposition, Disposition::ExhaustedLocalFallback);

        let uri = response.image_url.unwrap();
        let (mime, bytes) = super::decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 96);
        assert_eq!(decoded.height(), 96);
    }

    #[test]
    fn engine_returns_null_for_empty_prompt() {
        let engine = IllustrationEngine::new(offline_config()).unwrap();
        assert_eq!(engine.generate("   ").image_url, None);
        assert_eq!(engine.generate("").image_url, None);
    }
}
