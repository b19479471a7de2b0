//! Screenshot transport resolution
//!
//! Decides, for each captured frame, whether the model gets a reference
//! (URL) or an inlined base64 payload. References are preferred: they keep
//! the request body small. Inline payloads are downscaled and re-encoded
//! before shipping. Every stage that cannot produce a valid image collapses
//! to `None` rather than raising; callers treat that as "no visual context".

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::remote::{RawCapture, RemoteClient};

/// Minimum plausible length for an encoded image payload. Anything shorter
/// is a capture failure, not a real frame.
pub const MIN_ENCODED_LEN: usize = 100;

/// Maximum width for inlined frames; wider captures are downscaled.
const MAX_INLINE_WIDTH: u32 = 800;

/// JPEG quality for re-encoded inline frames.
const JPEG_QUALITY: u8 = 75;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// How a captured frame travels to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTransport {
    /// A reachable URL; handed to the model unchanged.
    Reference(String),
    /// Base64-encoded bytes with their media type.
    Inline { data: String, media_type: String },
}

/// Captures frames and classifies their transport.
#[derive(Debug, Clone)]
pub struct ScreenshotResolver {
    remote: RemoteClient,
    http: reqwest::Client,
}

impl ScreenshotResolver {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            remote: RemoteClient::new(config)?,
            http,
        })
    }

    /// Capture a frame and resolve its transport.
    ///
    /// With `prefer_reference`, a URL-form capture is returned unchanged;
    /// otherwise the referenced bytes are fetched, downscaled, and inlined.
    pub async fn capture(&self, prefer_reference: bool) -> Option<ImageTransport> {
        let raw = match self.remote.screenshot_raw().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Screenshot capture failed");
                return None;
            }
        };

        self.resolve_capture(raw, prefer_reference).await
    }

    async fn resolve_capture(
        &self,
        raw: RawCapture,
        prefer_reference: bool,
    ) -> Option<ImageTransport> {
        if raw.content_type.contains("application/json") {
            let value: Value = match serde_json::from_slice(&raw.body) {
                Ok(v) => v,
                Err(_) => {
                    warn!("Screenshot response is not valid JSON");
                    return None;
                }
            };

            let image_data = match extract_image_field(&value) {
                Some(data) => data,
                None => {
                    warn!("Screenshot JSON missing image field");
                    return None;
                }
            };

            return self.resolve_value(&image_data, prefer_reference).await;
        }

        if raw.content_type.contains("image/") {
            let media_type = raw.content_type.clone();
            return validate_inline(BASE64.encode(&raw.body), media_type);
        }

        // Plain text: the body may already be a bare base64 payload
        let text = String::from_utf8(raw.body).ok()?;
        let text = text.trim();
        if looks_like_base64(text) && text.len() >= MIN_ENCODED_LEN {
            return Some(ImageTransport::Inline {
                data: text.to_string(),
                media_type: "image/png".to_string(),
            });
        }

        warn!(
            content_type = %raw.content_type,
            len = text.len(),
            "Screenshot response unusable"
        );
        None
    }

    /// Resolve an extracted image value (URL, data URI, or bare base64).
    async fn resolve_value(&self, data: &str, prefer_reference: bool) -> Option<ImageTransport> {
        let data = data.trim();

        if is_reference(data) {
            if prefer_reference {
                debug!(url = %truncate_for_log(data), "Using screenshot reference");
                return Some(ImageTransport::Reference(data.to_string()));
            }
            return self.fetch_inline(data).await;
        }

        let body = strip_data_uri(data);
        if looks_like_base64(body) && body.len() >= MIN_ENCODED_LEN {
            return Some(ImageTransport::Inline {
                data: body.to_string(),
                media_type: "image/png".to_string(),
            });
        }

        warn!(len = body.len(), "Screenshot payload too short or malformed");
        None
    }

    /// Fetch referenced bytes, downscale, and inline them.
    async fn fetch_inline(&self, url: &str) -> Option<ImageTransport> {
        debug!(url = %truncate_for_log(url), "Downloading screenshot for inlining");

        let bytes = match self.http.get(url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => response.bytes().await.ok()?.to_vec(),
                Err(e) => {
                    warn!(error = %e, "Screenshot download rejected");
                    return None;
                }
            },
            Err(e) => {
                warn!(error = %e, "Screenshot download failed");
                return None;
            }
        };

        let (bytes, media_type) = reencode_for_inline(&bytes);
        validate_inline(BASE64.encode(&bytes), media_type.to_string())
    }
}

/// Pull the image payload out of a structured capture body. The endpoint
/// uses several field names depending on the action that produced it.
fn extract_image_field(value: &Value) -> Option<String> {
    for key in ["image", "screenshot", "data", "base64"] {
        if let Some(data) = value.get(key).and_then(|v| v.as_str()) {
            if !data.is_empty() {
                return Some(data.to_string());
            }
        }
    }

    let desktop = value.get("desktop")?;
    for key in ["screenshot", "image"] {
        if let Some(data) = desktop.get(key).and_then(|v| v.as_str()) {
            if !data.is_empty() {
                return Some(data.to_string());
            }
        }
    }

    None
}

fn is_reference(data: &str) -> bool {
    data.starts_with("http://") || data.starts_with("https://")
}

/// Strip a `data:` URI prefix down to its encoded body.
fn strip_data_uri(data: &str) -> &str {
    if data.starts_with("data:") {
        match data.split_once(',') {
            Some((_, body)) => body,
            None => data,
        }
    } else {
        data
    }
}

fn looks_like_base64(data: &str) -> bool {
    !data.is_empty()
        && data
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

fn validate_inline(encoded: String, media_type: String) -> Option<ImageTransport> {
    if encoded.len() < MIN_ENCODED_LEN {
        warn!(len = encoded.len(), "Encoded screenshot below minimum size");
        return None;
    }
    debug!(len = encoded.len(), "Screenshot inlined");
    Some(ImageTransport::Inline {
        data: encoded,
        media_type,
    })
}

/// Downscale to the inline width bound and re-encode as JPEG. Bytes that
/// cannot be decoded pass through unchanged.
fn reencode_for_inline(bytes: &[u8]) -> (Vec<u8>, &'static str) {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            warn!(error = %e, "Screenshot decode failed, inlining original bytes");
            return (bytes.to_vec(), "image/png");
        }
    };

    let img = if img.width() > MAX_INLINE_WIDTH {
        let ratio = MAX_INLINE_WIDTH as f64 / img.width() as f64;
        let height = (img.height() as f64 * ratio) as u32;
        img.resize(MAX_INLINE_WIDTH, height.max(1), FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    match rgb.write_with_encoder(encoder) {
        Ok(()) => {
            debug!(bytes = out.len(), "Screenshot re-encoded");
            (out, "image/jpeg")
        }
        Err(e) => {
            warn!(error = %e, "Screenshot re-encode failed, inlining original bytes");
            (bytes.to_vec(), "image/png")
        }
    }
}

fn truncate_for_log(s: &str) -> &str {
    match s.char_indices().nth(80) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> ScreenshotResolver {
        ScreenshotResolver::new(&RemoteConfig {
            base_url: "http://127.0.0.1:1/api".to_string(),
            api_key: "rk-test".to_string(),
            computer_id: "vm-1".to_string(),
        })
        .unwrap()
    }

    fn json_capture(body: Value) -> RawCapture {
        RawCapture {
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    #[test]
    fn test_extract_image_field_variants() {
        assert_eq!(
            extract_image_field(&json!({"image": "abc"})),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_image_field(&json!({"screenshot": "abc"})),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_image_field(&json!({"desktop": {"screenshot": "abc"}})),
            Some("abc".to_string())
        );
        assert_eq!(extract_image_field(&json!({"image": ""})), None);
        assert_eq!(extract_image_field(&json!({"status": "ok"})), None);
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/png;base64,abcd"), "abcd");
        assert_eq!(strip_data_uri("data:,abcd"), "abcd");
        assert_eq!(strip_data_uri("abcd"), "abcd");
    }

    #[test]
    fn test_looks_like_base64() {
        assert!(looks_like_base64("aGVsbG8vd29ybGQrZm9vPQ=="));
        assert!(!looks_like_base64("not base64!"));
        assert!(!looks_like_base64(""));
    }

    #[tokio::test]
    async fn test_reference_passthrough_is_idempotent() {
        let resolver = resolver();
        let url = "https://cdn.example.com/frames/1.png";

        let first = resolver.resolve_value(url, true).await.unwrap();
        let second = resolver.resolve_value(url, true).await.unwrap();

        assert_eq!(first, ImageTransport::Reference(url.to_string()));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_short_payload_rejected() {
        let resolver = resolver();
        let raw = json_capture(json!({ "image": "aGVsbG8=" }));
        assert_eq!(resolver.resolve_capture(raw, true).await, None);
    }

    #[tokio::test]
    async fn test_valid_base64_payload_inlined() {
        let resolver = resolver();
        let data = "A".repeat(MIN_ENCODED_LEN);
        let raw = json_capture(json!({ "screenshot": data }));

        match resolver.resolve_capture(raw, true).await {
            Some(ImageTransport::Inline { data: inlined, media_type }) => {
                assert_eq!(inlined, data);
                assert_eq!(media_type, "image/png");
            }
            other => panic!("expected inline transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_data_uri_stripped_before_validation() {
        let resolver = resolver();
        let body = "B".repeat(MIN_ENCODED_LEN);
        let raw = json_capture(json!({ "image": format!("data:image/png;base64,{}", body) }));

        match resolver.resolve_capture(raw, true).await {
            Some(ImageTransport::Inline { data, .. }) => assert_eq!(data, body),
            other => panic!("expected inline transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_url_capture_prefers_reference() {
        let resolver = resolver();
        let raw = json_capture(json!({ "image": "https://cdn.example.com/frames/2.png" }));

        assert_eq!(
            resolver.resolve_capture(raw, true).await,
            Some(ImageTransport::Reference(
                "https://cdn.example.com/frames/2.png".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_binary_capture_inlined() {
        let resolver = resolver();
        // Raw body long enough that its base64 form clears the threshold
        let raw = RawCapture {
            content_type: "image/png".to_string(),
            body: vec![0u8; 120],
        };

        match resolver.resolve_capture(raw, true).await {
            Some(ImageTransport::Inline { media_type, .. }) => {
                assert_eq!(media_type, "image/png");
            }
            other => panic!("expected inline transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_text_rejected() {
        let resolver = resolver();
        let raw = RawCapture {
            content_type: "text/plain".to_string(),
            body: b"not an image at all".to_vec(),
        };
        assert_eq!(resolver.resolve_capture(raw, true).await, None);
    }

    #[test]
    fn test_reencode_passes_through_undecodable_bytes() {
        let bytes = b"definitely not an image";
        let (out, media_type) = reencode_for_inline(bytes);
        assert_eq!(out, bytes);
        assert_eq!(media_type, "image/png");
    }

    #[test]
    fn test_reencode_downscales_wide_images() {
        let img = image::RgbImage::from_pixel(1600, 900, image::Rgb([120, 30, 200]));
        let mut png = Vec::new();
        img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut png))
            .unwrap();

        let (out, media_type) = reencode_for_inline(&png);
        assert_eq!(media_type, "image/jpeg");

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), MAX_INLINE_WIDTH);
        assert_eq!(decoded.height(), 450);
    }
}
