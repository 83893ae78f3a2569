use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use storyframe_contracts::config::EncoderMode;
use storyframe_contracts::payload::{GenerateResponse, ImageResult};

/// Pure terminal step: serializes the winning image (or its absence)
/// into the response payload. No side effects, no failure modes.
#[derive(Debug, Clone, Copy)]
pub struct ResponseEncoder {
    mode: EncoderMode,
}

impl ResponseEncoder {
    pub fn new(mode: EncoderMode) -> Self {
        Self { mode }
    }

    pub fn encode(&self, result: Option<&ImageResult>) -> GenerateResponse {
        let Some(result) = result else {
            return GenerateResponse::empty();
        };
        let image_url = match self.mode {
            EncoderMode::InlineDataUri => data_uri(result),
            // Direct-link deployments hand out the provider's own URL;
            // results without one (local fallback included) still
            // embed inline.
            EncoderMode::DirectLink => result
                .source_url
                .clone()
                .unwrap_or_else(|| data_uri(result)),
        };
        GenerateResponse {
            image_url: Some(image_url),
        }
    }
}

pub fn data_uri(result: &ImageResult) -> String {
    format!(
        "data:{};base64,{}",
        result.media_type.mime(),
        BASE64.encode(&result.bytes)
    )
}

/// Splits a data URI back into its MIME type and bytes. Used by tests
/// and diagnostic tooling.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let remainder = uri.strip_prefix("data:")?;
    let (header, payload) = remainder.split_once(',')?;
    let mime = header.strip_suffix(";base64")?.to_string();
    let bytes = BASE64.decode(payload.as_bytes()).ok()?;
    Some((mime, bytes))
}

#[cfg(test)]
mod tests {
    use storyframe_contracts::config::EncoderMode;
    use storyframe_contracts::payload::{ImageResult, MediaType};

    use super::{decode_data_uri, ResponseEncoder};

    fn result(source_url: Option<&str>) -> ImageResult {
        ImageResult {
            bytes: vec![0x01, 0x02, 0xFE, 0xFF],
            media_type: MediaType::Webp,
            provenance: "test".to_string(),
            source_url: source_url.map(str::to_string),
        }
    }

    #[test]
    fn inline_round_trip_recovers_bytes_exactly() {
        let encoder = ResponseEncoder::new(EncoderMode::InlineDataUri);
        let response = encoder.encode(Some(&result(None)));
        let uri = response.image_url.unwrap();
        assert!(uri.starts_with("data:image/webp;base64,"));

        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/webp");
        assert_eq!(bytes, vec![0x01, 0x02, 0xFE, 0xFF]);
    }

    #[test]
    fn direct_link_prefers_source_url() {
        let encoder = ResponseEncoder::new(EncoderMode::DirectLink);
        let response = encoder.encode(Some(&result(Some("https://img.example/x.webp"))));
        assert_eq!(
            response.image_url.as_deref(),
            Some("https://img.example/x.webp")
        );
    }

    #[test]
    fn direct_link_without_source_url_embeds_inline() {
        let encoder = ResponseEncoder::new(EncoderMode::DirectLink);
        let response = encoder.encode(Some(&result(None)));
        assert!(response
            .image_url
            .unwrap()
            .starts_with("data:image/webp;base64,"));
    }

    #[test]
    fn null_result_encodes_as_null_payload() {
        let encoder = ResponseEncoder::new(EncoderMode::InlineDataUri);
        let response = encoder.encode(None);
        assert_eq!(response.image_url, None);
    }
}
