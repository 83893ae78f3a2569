use std::thread;
use std::time::Instant;

use storyframe_contracts::config::ProviderSpec;
use storyframe_contracts::payload::{
    Attempt, AttemptOutcome, ImageBytes, ImageResult, LOCAL_FALLBACK_PROVENANCE,
};

use crate::fallback;
use crate::prompt;
use crate::providers::ImageProvider;
use crate::refine::PromptRefiner;
use crate::retry::{RetryDecision, RetryPolicy};

/// One slot in the cascade: the provider, its spec, and its retry
/// rule, tried strictly in list order.
pub struct CascadeEntry {
    pub spec: ProviderSpec,
    provider: Box<dyn ImageProvider>,
    policy: RetryPolicy,
}

impl CascadeEntry {
    pub fn new(spec: ProviderSpec, provider: Box<dyn ImageProvider>) -> Self {
        let policy = RetryPolicy::from_spec(&spec);
        Self {
            spec,
            provider,
            policy,
        }
    }
}

/// Terminal state of one cascade evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The effective prompt was empty; no provider was invoked.
    NoImageRequested,
    /// Some provider produced image bytes.
    Succeeded,
    /// All providers were exhausted and the local generator ran.
    /// `result` is `None` only if the generator itself failed.
    ExhaustedLocalFallback,
}

#[derive(Debug)]
pub struct CascadeReport {
    pub disposition: Disposition,
    pub result: Option<ImageResult>,
    pub attempts: Vec<Attempt>,
}

/// Drives the provider cascade for one request: fixed priority order,
/// sequential attempts, short-circuit on the first success, local
/// placeholder on exhaustion. Never returns an error to the caller.
pub struct Orchestrator {
    entries: Vec<CascadeEntry>,
    fallback_width: u32,
    fallback_height: u32,
    refiner: Option<Box<dyn PromptRefiner>>,
}

impl Orchestrator {
    pub fn new(
        entries: Vec<CascadeEntry>,
        fallback_width: u32,
        fallback_height: u32,
        refiner: Option<Box<dyn PromptRefiner>>,
    ) -> Self {
        Self {
            entries,
            fallback_width,
            fallback_height,
            refiner,
        }
    }

    pub fn run(&self, raw_prompt: &str) -> CascadeReport {
        if prompt::is_effectively_empty(raw_prompt) {
            tracing::debug!("empty prompt, skipping cascade");
            return CascadeReport {
                disposition: Disposition::NoImageRequested,
                result: None,
                attempts: Vec::new(),
            };
        }

        // Refinement failure is swallowed: the raw prompt stands in.
        let effective = self
            .refiner
            .as_ref()
            .and_then(|refiner| refiner.refine(raw_prompt))
            .unwrap_or_else(|| raw_prompt.to_string());

        let mut attempts = Vec::new();
        let mut last_dims: Option<(u32, u32)> = None;

        for entry in &self.entries {
            last_dims = Some((entry.spec.width, entry.spec.height));
            if let Some(image) = self.try_provider(entry, &effective, &mut attempts) {
                tracing::info!(provider = %entry.spec.id, "cascade succeeded");
                return CascadeReport {
                    disposition: Disposition::Succeeded,
                    result: Some(ImageResult::from_bytes(image, entry.spec.id.clone())),
                    attempts,
                };
            }
            tracing::warn!(provider = %entry.spec.id, "provider exhausted, moving on");
        }

        let (width, height) =
            last_dims.unwrap_or((self.fallback_width, self.fallback_height));
        let result = match fallback::generate(width, height) {
            Ok(image) => Some(ImageResult::from_bytes(image, LOCAL_FALLBACK_PROVENANCE)),
            Err(err) => {
                // The final safety net has no failure path visible to
                // the caller; a null result is the worst case.
                tracing::error!(error = %err, "local fallback generation failed");
                None
            }
        };
        CascadeReport {
            disposition: Disposition::ExhaustedLocalFallback,
            result,
            attempts,
        }
    }

    /// Runs one provider under its retry policy. Returns the image on
    /// success, `None` once the provider is abandoned or exhausted.
    fn try_provider(
        &self,
        entry: &CascadeEntry,
        effective_prompt: &str,
        attempts: &mut Vec<Attempt>,
    ) -> Option<ImageBytes> {
        let provider_prompt = prompt::transform(effective_prompt, &entry.spec);
        let mut attempts_made = 0usize;

        loop {
            let index = attempts_made;
            let started = Instant::now();
            let outcome = entry.provider.invoke(&provider_prompt, &entry.spec);
            let elapsed = started.elapsed();
            attempts_made += 1;

            match outcome {
                Ok(image) => {
                    tracing::info!(
                        provider = %entry.spec.id,
                        attempt = index,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "attempt succeeded"
                    );
                    attempts.push(Attempt {
                        provider: entry.spec.id.clone(),
                        index,
                        outcome: AttemptOutcome::Succeeded,
                        elapsed,
                    });
                    return Some(image);
                }
                Err(failure) => {
                    tracing::warn!(
                        provider = %entry.spec.id,
                        attempt = index,
                        elapsed_ms = elapsed.as_millis() as u64,
                        category = failure.category(),
                        "attempt failed: {failure}"
                    );
                    let outcome = if failure.is_fatal() {
                        AttemptOutcome::Fatal(failure.category().to_string())
                    } else {
                        AttemptOutcome::Retryable(failure.category().to_string())
                    };
                    attempts.push(Attempt {
                        provider: entry.spec.id.clone(),
                        index,
                        outcome,
                        elapsed,
                    });

                    match entry.policy.decide(&failure, attempts_made) {
                        RetryDecision::Abandon => return None,
                        RetryDecision::RetryAfter(delay) => thread::sleep(delay),
                        RetryDecision::RetryNow => {}
                    }
                }
            }
        }
    }
}
