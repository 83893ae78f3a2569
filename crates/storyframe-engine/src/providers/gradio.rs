use std::fs;
use std::path::Path;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use storyframe_contracts::config::{ProviderSpec, SeedPolicy};
use storyframe_contracts::failure::ProviderFailure;
use storyframe_contracts::payload::{ImageBytes, MediaType};

use super::{failure_from_request_error, failure_from_status, http_client, truncate};

/// Hosted-space adapter. The call is an ordered positional argument
/// list; the result is a gallery whose first entry arrives in one of
/// several shapes, normalized here into a single tagged union.
pub struct GradioSpaceProvider {
    http: HttpClient,
}

/// Normalized gallery-entry outcome. One decoder per tag, resolved by
/// a single dispatch function instead of branching spread through the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEntry {
    /// Image bytes carried inline as a `data:` URI.
    BytesInline(String),
    /// A string path (or URL) straight in the entry, or under an
    /// `image` key.
    PathOnDisk(String),
    /// An `image` key holding a nested mapping with a `path` key.
    NestedPathMapping(String),
}

impl GalleryEntry {
    fn location(&self) -> &str {
        match self {
            GalleryEntry::BytesInline(uri) => uri,
            GalleryEntry::PathOnDisk(path) | GalleryEntry::NestedPathMapping(path) => path,
        }
    }
}

/// Dispatches one raw gallery entry into its normalized tag.
pub fn decode_gallery_entry(entry: &Value) -> Result<GalleryEntry, ProviderFailure> {
    if let Some(text) = entry.as_str() {
        return decode_string_entry(text);
    }
    if let Some(mapping) = entry.as_object() {
        if let Some(image) = mapping.get("image") {
            if let Some(text) = image.as_str() {
                return decode_string_entry(text);
            }
            if let Some(nested) = image.as_object() {
                if let Some(path) = nested
                    .get("path")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                {
                    return Ok(GalleryEntry::NestedPathMapping(path.to_string()));
                }
            }
        }
        // Some spaces flatten the nested form to a bare path mapping.
        if let Some(path) = mapping
            .get("path")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Ok(GalleryEntry::PathOnDisk(path.to_string()));
        }
    }
    Err(ProviderFailure::MalformedResponse(format!(
        "unrecognized gallery entry shape: {}",
        truncate(&entry.to_string(), 256)
    )))
}

fn decode_string_entry(text: &str) -> Result<GalleryEntry, ProviderFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProviderFailure::EmptyResponse);
    }
    if trimmed.starts_with("data:") {
        return Ok(GalleryEntry::BytesInline(trimmed.to_string()));
    }
    Ok(GalleryEntry::PathOnDisk(trimmed.to_string()))
}

impl GradioSpaceProvider {
    pub fn new(spec: &ProviderSpec) -> Result<Self> {
        Ok(Self {
            http: http_client(spec.timeout)?,
        })
    }

    fn endpoint(spec: &ProviderSpec) -> String {
        format!(
            "{}/api{}",
            spec.base_url,
            if spec.model.starts_with('/') {
                spec.model.clone()
            } else {
                format!("/{}", spec.model)
            }
        )
    }

    /// The space's positional argument list, in declared order:
    /// prompt, negative prompt, use-negative-prompt flag, seed, width,
    /// height, guidance scale, step count, randomize-seed flag.
    fn positional_args(prompt: &str, spec: &ProviderSpec) -> Vec<Value> {
        let (seed, randomize) = match spec.seed {
            SeedPolicy::Fixed(seed) => (seed, false),
            SeedPolicy::Randomize => (0, true),
        };
        vec![
            json!(prompt),
            json!(spec.negative_prompt),
            json!(!spec.negative_prompt.is_empty()),
            json!(seed),
            json!(spec.width),
            json!(spec.height),
            json!(spec.guidance_scale),
            json!(spec.steps),
            json!(randomize),
        ]
    }

    /// Turns a normalized entry into bytes. Local paths produced by
    /// the space's client library are read once and not kept open;
    /// remote URLs are downloaded; inline data URIs are decoded.
    fn resolve_entry(
        &self,
        entry: &GalleryEntry,
        spec: &ProviderSpec,
    ) -> Result<ImageBytes, ProviderFailure> {
        let location = entry.location();
        if let GalleryEntry::BytesInline(uri) = entry {
            return decode_inline_data_uri(uri, spec);
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return self.download(location, spec);
        }
        let bytes = fs::read(Path::new(location)).map_err(|err| {
            ProviderFailure::MalformedResponse(format!(
                "gallery path unreadable ({location}): {err}"
            ))
        })?;
        if bytes.is_empty() {
            return Err(ProviderFailure::EmptyResponse);
        }
        let media_type = MediaType::sniff(&bytes).unwrap_or(spec.media_type);
        Ok(ImageBytes {
            bytes,
            media_type,
            source_url: None,
        })
    }

    fn download(&self, url: &str, spec: &ProviderSpec) -> Result<ImageBytes, ProviderFailure> {
        let response = self
            .http
            .get(url)
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
            source_url: Some(url.to_string()),
        })
    }
}

fn decode_inline_data_uri(
    uri: &str,
    spec: &ProviderSpec,
) -> Result<ImageBytes, ProviderFailure> {
    let remainder = uri.strip_prefix("data:").unwrap_or(uri);
    let (header, payload) = remainder.split_once(',').ok_or_else(|| {
        ProviderFailure::MalformedResponse("inline data URI missing payload".to_string())
    })?;
    let bytes = BASE64.decode(payload.trim().as_bytes()).map_err(|err| {
        ProviderFailure::MalformedResponse(format!("inline image base64 decode failed: {err}"))
    })?;
    if bytes.is_empty() {
        return Err(ProviderFailure::EmptyResponse);
    }
    let media_type = MediaType::from_mime(header)
        .or_else(|| MediaType::sniff(&bytes))
        .unwrap_or(spec.media_type);
    Ok(ImageBytes {
        bytes,
        media_type,
        source_url: None,
    })
}

impl super::ImageProvider for GradioSpaceProvider {
    fn name(&self) -> &str {
        "gradio-space"
    }

    fn invoke(&self, prompt: &str, spec: &ProviderSpec) -> Result<ImageBytes, ProviderFailure> {
        let endpoint = Self::endpoint(spec);
        let response = self
            .http
            .post(&endpoint)
            .json(&json!({ "data": Self::positional_args(prompt, spec) }))
            .send()
            .map_err(|err| failure_from_request_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(failure_from_status(status, body));
        }

        let payload: Value = response.json().map_err(|err| {
            ProviderFailure::MalformedResponse(format!("space returned invalid JSON: {err}"))
        })?;
        let gallery = payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderFailure::MalformedResponse("space response missing gallery".to_string())
            })?;
        let first = gallery.first().ok_or(ProviderFailure::EmptyResponse)?;

        let entry = decode_gallery_entry(first)?;
        self.resolve_entry(&entry, spec)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::json;
    use storyframe_contracts::config::{
        CleaningPolicy, ProviderKind, PromptTemplate, ProviderSpec, SeedPolicy,
    };
    use storyframe_contracts::failure::ProviderFailure;
    use storyframe_contracts::payload::MediaType;

    use super::{decode_gallery_entry, GalleryEntry, GradioSpaceProvider};

    fn spec() -> ProviderSpec {
        ProviderSpec {
            id: "gradio-test".to_string(),
            kind: ProviderKind::GradioSpace,
            base_url: "http://localhost".to_string(),
            model: "/run".to_string(),
            media_type: MediaType::Webp,
            cleaning: CleaningPolicy::Strict,
            truncate_chars: 300,
            template: PromptTemplate::new("", ""),
            negative_prompt: "blurry".to_string(),
            width: 64,
            height: 64,
            guidance_scale: 3.0,
            steps: 8,
            seed: SeedPolicy::Randomize,
            timeout: std::time::Duration::from_secs(1),
            max_attempts: 1,
            rate_limit_backoff: std::time::Duration::from_millis(1),
            token: None,
        }
    }

    #[test]
    fn string_entry_decodes_as_path() {
        let entry = decode_gallery_entry(&json!("/tmp/result.webp")).unwrap();
        assert_eq!(entry, GalleryEntry::PathOnDisk("/tmp/result.webp".to_string()));
    }

    #[test]
    fn image_key_with_string_decodes_as_path() {
        let entry = decode_gallery_entry(&json!({ "image": "/tmp/a.webp" })).unwrap();
        assert_eq!(entry, GalleryEntry::PathOnDisk("/tmp/a.webp".to_string()));
    }

    #[test]
    fn nested_path_mapping_decodes() {
        let entry =
            decode_gallery_entry(&json!({ "image": { "path": "/tmp/nested.webp" } })).unwrap();
        assert_eq!(
            entry,
            GalleryEntry::NestedPathMapping("/tmp/nested.webp".to_string())
        );
    }

    #[test]
    fn inline_data_uri_decodes_as_bytes() {
        let entry = decode_gallery_entry(&json!("data:image/png;base64,AAAA")).unwrap();
        assert!(matches!(entry, GalleryEntry::BytesInline(_)));
    }

    #[test]
    fn unrecognized_shape_is_malformed_response() {
        let err = decode_gallery_entry(&json!(42)).unwrap_err();
        assert!(matches!(err, ProviderFailure::MalformedResponse(_)));
        let err = decode_gallery_entry(&json!({ "unrelated": true })).unwrap_err();
        assert!(matches!(err, ProviderFailure::MalformedResponse(_)));
    }

    #[test]
    fn local_path_entry_reads_bytes_once() {
        let spec = spec();
        let provider = GradioSpaceProvider::new(&spec).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02]).unwrap();

        let entry = GalleryEntry::PathOnDisk(file.path().to_string_lossy().to_string());
        let image = provider.resolve_entry(&entry, &spec).unwrap();
        assert_eq!(image.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02]);
        assert_eq!(image.media_type, MediaType::Jpeg);
        assert!(image.source_url.is_none());
    }

    #[test]
    fn missing_local_path_is_malformed_response() {
        let spec = spec();
        let provider = GradioSpaceProvider::new(&spec).unwrap();
        let entry = GalleryEntry::PathOnDisk("/definitely/not/here.webp".to_string());
        let err = provider.resolve_entry(&entry, &spec).unwrap_err();
        assert!(matches!(err, ProviderFailure::MalformedResponse(_)));
    }

    #[test]
    fn inline_entry_round_trips_bytes() {
        let spec = spec();
        let provider = GradioSpaceProvider::new(&spec).unwrap();
        let payload = vec![1u8, 2, 3, 4];
        let uri = format!("data:image/webp;base64,{}", BASE64.encode(&payload));
        let image = provider
            .resolve_entry(&GalleryEntry::BytesInline(uri), &spec)
            .unwrap();
        assert_eq!(image.bytes, payload);
        assert_eq!(image.media_type, MediaType::Webp);
    }

    #[test]
    fn positional_args_follow_declared_order() {
        let args = GradioSpaceProvider::positional_args("a boat", &spec());
        assert_eq!(args[0], json!("a boat"));
        assert_eq!(args[1], json!("blurry"));
        assert_eq!(args[2], json!(true));
        assert_eq!(args[3], json!(0));
        assert_eq!(args[4], json!(64));
        assert_eq!(args[5], json!(64));
        assert_eq!(args[6], json!(3.0));
        assert_eq!(args[7], json!(8));
        assert_eq!(args[8], json!(true));
    }
}
