use storyframe_contracts::config::{CleaningPolicy, ProviderSpec};

/// Turns raw request text into the prompt string sent to one provider:
/// clean, truncate to the provider's cap, then wrap in the provider's
/// template scaffold. Deterministic for a given input and spec.
pub fn transform(raw: &str, spec: &ProviderSpec) -> String {
    let cleaned = clean(raw, spec.cleaning);
    let truncated = truncate_chars(&cleaned, spec.truncate_chars);
    spec.template.apply(&truncated)
}

/// Reports whether the raw text carries any usable prompt content.
/// An empty effective prompt skips the cascade entirely.
pub fn is_effectively_empty(raw: &str) -> bool {
    raw.trim().is_empty()
}

fn clean(raw: &str, policy: CleaningPolicy) -> String {
    match policy {
        CleaningPolicy::Strict => collapse_whitespace(
            &raw.chars()
                .filter(|c| {
                    c.is_alphanumeric()
                        || *c == '_'
                        || c.is_whitespace()
                        || matches!(c, '.' | ',' | '\'')
                })
                .collect::<String>(),
        ),
        CleaningPolicy::Lenient => collapse_whitespace(raw),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
