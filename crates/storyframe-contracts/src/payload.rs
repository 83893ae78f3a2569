use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provenance tag carried by placeholder images produced locally after
/// every configured provider was exhausted.
pub const LOCAL_FALLBACK_PROVENANCE: &str = "local-fallback";

/// Declared media type of a returned image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    pub fn from_mime(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return Some(MediaType::Jpeg);
        }
        if lowered.contains("webp") {
            return Some(MediaType::Webp);
        }
        if lowered.contains("png") {
            return Some(MediaType::Png);
        }
        None
    }

    /// Best-effort sniff from magic bytes, for providers that return an
    /// opaque body with no usable content-type header.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(MediaType::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(MediaType::Png);
        }
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(MediaType::Webp);
        }
        None
    }
}

/// Image bytes as returned by one provider adapter, before the
/// orchestrator stamps provenance on them.
#[derive(Debug, Clone)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    /// Set when the bytes were fetched from a stable public URL that a
    /// client could link to directly instead of embedding.
    pub source_url: Option<String>,
}

/// The terminal artifact of one request: always non-empty by the time
/// a request completes, unless the caller sent an empty prompt.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub provenance: String,
    pub source_url: Option<String>,
}

impl ImageResult {
    pub fn from_bytes(image: ImageBytes, provenance: impl Into<String>) -> Self {
        Self {
            bytes: image.bytes,
            media_type: image.media_type,
            provenance: provenance.into(),
            source_url: image.source_url,
        }
    }
}

/// One call to one provider, recorded for logging and diagnosis only.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub provider: String,
    pub index: usize,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// Failure category label, e.g. `rate-limited` or `timeout`.
    Retryable(String),
    Fatal(String),
}

impl AttemptOutcome {
    pub fn label(&self) -> &str {
        match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::Retryable(category) | AttemptOutcome::Fatal(category) => category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

impl GenerateResponse {
    pub fn empty() -> Self {
        Self { image_url: None }
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerateResponse, MediaType};

    #[test]
    fn media_type_from_mime_handles_parameters() {
        assert_eq!(
            MediaType::from_mime("image/jpeg; charset=binary"),
            Some(MediaType::Jpeg)
        );
        assert_eq!(MediaType::from_mime("IMAGE/WEBP"), Some(MediaType::Webp));
        assert_eq!(MediaType::from_mime("text/html"), None);
    }

    #[test]
    fn media_type_sniffs_magic_bytes() {
        assert_eq!(
            MediaType::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(MediaType::Jpeg)
        );
        assert_eq!(
            MediaType::sniff(b"\x89PNG\r\n\x1a\n rest"),
            Some(MediaType::Png)
        );
        assert_eq!(
            MediaType::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(MediaType::Webp)
        );
        assert_eq!(MediaType::sniff(b"<html>"), None);
    }

    #[test]
    fn response_serializes_with_camel_case_key() {
        let populated = GenerateResponse {
            image_url: Some("data:image/png;base64,AA==".to_string()),
        };
        let raw = serde_json::to_string(&populated).unwrap();
        assert!(raw.contains("\"imageUrl\""));

        let null = serde_json::to_string(&GenerateResponse::empty()).unwrap();
        assert_eq!(null, "{\"imageUrl\":null}");
    }
}
