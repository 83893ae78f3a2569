use std::env;
use std::time::Duration;

use crate::payload::MediaType;

/// How a provider adapter constructs its call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Authenticated inference API returning raw image bytes.
    HfInference,
    /// Hosted space invoked with an ordered positional argument list,
    /// returning a gallery of heterogeneous entries.
    GradioSpace,
    /// URL template with the prompt query-encoded into the path.
    UrlImage,
}

/// Prompt cleaning policy, chosen per provider family.
///
/// Strict filtering protects providers that are sensitive to prompt
/// injection artifacts; lenient cleaning preserves punctuation for
/// providers whose output quality depends on natural phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningPolicy {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    Fixed(i64),
    Randomize,
}

/// Deterministic scaffold wrapped around the cleaned prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub before: String,
    pub after: String,
}

impl PromptTemplate {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        format!("{}'{}'. {}", self.before, text, self.after)
    }
}

/// Static per-provider configuration. Loaded at startup, immutable.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    /// Model identifier, space API path, or URL path segment depending
    /// on the provider kind.
    pub model: String,
    pub media_type: MediaType,
    pub cleaning: CleaningPolicy,
    pub truncate_chars: usize,
    pub template: PromptTemplate,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub guidance_scale: f64,
    pub steps: u32,
    pub seed: SeedPolicy,
    pub timeout: Duration,
    pub max_attempts: usize,
    pub rate_limit_backoff: Duration,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderMode {
    /// Embed the bytes as a `data:` URI.
    InlineDataUri,
    /// Return the provider's own stable URL when one exists, falling
    /// back to inline bytes otherwise.
    DirectLink,
}

/// Optional LLM prompt-refinement step.
#[derive(Debug, Clone)]
pub struct RefinerConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// The whole cascade as data: an ordered list of enabled providers
/// plus the knobs that live outside any single provider.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub providers: Vec<ProviderSpec>,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub encoder_mode: EncoderMode,
    pub refiner: RefinerConfig,
}

const STORYBOOK_TEMPLATE_BEFORE: &str =
    "Create a clear, detailed children's storybook illustration representing the following text: ";
const STORYBOOK_TEMPLATE_AFTER: &str = "Focus only on visible objects, people, setting, lighting \
     and actions. Avoid text, captions or watermarks. Use a colorful, cute style.";

const DEFAULT_NEGATIVE_PROMPT: &str = "(deformed, distorted, disfigured:1.3), poorly drawn, bad \
     anatomy, wrong anatomy, extra limb, missing limb, floating limbs, (mutated hands and \
     fingers:1.4), disconnected limbs, mutation, mutated, ugly, disgusting, blurry, amputation, \
     NSFW";

fn storybook_template() -> PromptTemplate {
    PromptTemplate::new(STORYBOOK_TEMPLATE_BEFORE, STORYBOOK_TEMPLATE_AFTER)
}

/// Priority-ordered default cascade. The list is tried front to back
/// and never load-balanced.
pub fn default_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec {
            id: "hf-sdxl".to_string(),
            kind: ProviderKind::HfInference,
            base_url: base_url_from_env(
                "HF_API_BASE",
                "https://api-inference.huggingface.co",
            ),
            model: "stabilityai/stable-diffusion-xl-base-1.0".to_string(),
            media_type: MediaType::Jpeg,
            cleaning: CleaningPolicy::Strict,
            truncate_chars: 300,
            template: storybook_template(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            width: 1024,
            height: 1024,
            guidance_scale: 7.0,
            steps: 30,
            seed: SeedPolicy::Randomize,
            timeout: env_duration_secs("STORYFRAME_HF_TIMEOUT_SECS", 60),
            max_attempts: env_usize("STORYFRAME_HF_MAX_ATTEMPTS", 3),
            rate_limit_backoff: env_duration_secs("STORYFRAME_BACKOFF_SECS", 20),
            token: non_empty_env("HF_TOKEN"),
        },
        ProviderSpec {
            id: "gradio-sdxl-flash".to_string(),
            kind: ProviderKind::GradioSpace,
            base_url: base_url_from_env(
                "GRADIO_SPACE_BASE",
                "https://kingnish-sdxl-flash.hf.space",
            ),
            model: "/run".to_string(),
            media_type: MediaType::Webp,
            cleaning: CleaningPolicy::Strict,
            truncate_chars: 300,
            template: storybook_template(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            width: 1024,
            height: 1024,
            guidance_scale: 3.0,
            steps: 8,
            seed: SeedPolicy::Randomize,
            timeout: env_duration_secs("STORYFRAME_GRADIO_TIMEOUT_SECS", 120),
            max_attempts: env_usize("STORYFRAME_GRADIO_MAX_ATTEMPTS", 2),
            rate_limit_backoff: env_duration_secs("STORYFRAME_BACKOFF_SECS", 20),
            token: None,
        },
        ProviderSpec {
            id: "url-pollinations".to_string(),
            kind: ProviderKind::UrlImage,
            base_url: base_url_from_env("IMAGE_URL_API_BASE", "https://image.pollinations.ai"),
            model: "prompt".to_string(),
            media_type: MediaType::Jpeg,
            cleaning: CleaningPolicy::Lenient,
            truncate_chars: 1000,
            template: storybook_template(),
            negative_prompt: String::new(),
            width: 768,
            height: 1024,
            guidance_scale: 0.0,
            steps: 0,
            seed: SeedPolicy::Fixed(42),
            timeout: env_duration_secs("STORYFRAME_URL_TIMEOUT_SECS", 30),
            max_attempts: env_usize("STORYFRAME_URL_MAX_ATTEMPTS", 3),
            rate_limit_backoff: env_duration_secs("STORYFRAME_BACKOFF_SECS", 20),
            token: None,
        },
    ]
}

impl CascadeConfig {
    /// Loads the full configuration surface from the environment.
    ///
    /// `STORYFRAME_PROVIDERS` is a comma-separated, priority-ordered
    /// list of provider ids; ids absent from the list are disabled.
    /// Unset means the full default cascade in default order.
    pub fn from_env() -> Self {
        let mut providers = default_providers();
        if let Some(selection) = non_empty_env("STORYFRAME_PROVIDERS") {
            let wanted: Vec<String> = selection
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
            providers = wanted
                .iter()
                .filter_map(|id| providers.iter().find(|spec| &spec.id == id).cloned())
                .collect();
        }

        let (fallback_width, fallback_height) = non_empty_env("STORYFRAME_FALLBACK_SIZE")
            .as_deref()
            .map(parse_dims)
            .unwrap_or((768, 1024));

        let encoder_mode = match non_empty_env("STORYFRAME_ENCODER").as_deref() {
            Some("link") | Some("direct-link") => EncoderMode::DirectLink,
            _ => EncoderMode::InlineDataUri,
        };

        Self {
            providers,
            fallback_width,
            fallback_height,
            encoder_mode,
            refiner: RefinerConfig {
                enabled: env_flag("STORYFRAME_REFINE"),
                base_url: base_url_from_env(
                    "HF_TEXT_API_BASE",
                    "https://router.huggingface.co/v1",
                ),
                model: non_empty_env("HF_TEXT_MODEL")
                    .unwrap_or_else(|| "meta-llama/Llama-3.1-8B-Instruct".to_string()),
                token: non_empty_env("HF_TOKEN"),
                timeout: env_duration_secs("STORYFRAME_REFINE_TIMEOUT_SECS", 20),
            },
        }
    }
}

/// Parses `WIDTHxHEIGHT`, defaulting to 768x1024 when unparseable.
pub fn parse_dims(size: &str) -> (u32, u32) {
    let mut parts = size.trim().splitn(2, ['x', 'X']);
    let width = parts.next().and_then(|value| value.trim().parse().ok());
    let height = parts.next().and_then(|value| value.trim().parse().ok());
    match (width, height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        _ => (768, 1024),
    }
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn base_url_from_env(key: &str, default: &str) -> String {
    non_empty_env(key)
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    let secs = non_empty_env(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

fn env_usize(key: &str, default: usize) -> usize {
    non_empty_env(key)
        .and_then(|value| value.parse().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    matches!(
        non_empty_env(key).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}
