//! Extraction helpers: JSON objects from LLM replies, image references
//! from query text, and image fetching/encoding.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{MediError, Result};

/// Timeout for fetching a caller-referenced image URL.
const IMAGE_FETCH_TIMEOUT_SECS: u64 = 30;

/// Non-greedy brace block, used as a fallback when a reply wraps its JSON
/// in prose. `(?s)` so objects may span lines.
static JSON_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// `http(s)` URL ending in an image extension.
static IMAGE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+\.(?:png|jpe?g|gif|bmp|webp)").unwrap());

/// Relative, absolute, or Windows-drive path ending in an image extension.
static IMAGE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\.{0,2}/|[A-Za-z]:\\)[^\s]+\.(?:png|jpe?g|gif|bmp|webp)").unwrap());

/// Parse the first JSON object out of an LLM reply.
///
/// Models asked for "JSON only" still tend to wrap the object in prose or
/// code fences. Strategy: try the span from the first `{` to the last `}`
/// (handles nested objects), then fall back to scanning non-greedy brace
/// blocks for the first one that parses.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        if let Ok(value) = serde_json::from_str(&text[start..=end]) {
            return Some(value);
        }
    }
    JSON_BLOCK_RE
        .find_iter(text)
        .find_map(|m| serde_json::from_str(m.as_str()).ok())
}

/// An image referenced by a request, ready to send to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Remote image that still needs fetching.
    Url(String),
    /// Already a `data:image/...;base64,` URI.
    DataUri(String),
    /// Local filesystem path (CLI / development use).
    Path(String),
}

/// Find an image reference embedded in free-text query content.
pub fn find_image_ref(query: &str) -> Option<ImageRef> {
    if query.trim_start().starts_with("data:image") {
        return Some(ImageRef::DataUri(query.trim().to_string()));
    }
    if let Some(m) = IMAGE_URL_RE.find(query) {
        return Some(ImageRef::Url(m.as_str().to_string()));
    }
    IMAGE_PATH_RE
        .find(query)
        .map(|m| ImageRef::Path(m.as_str().to_string()))
}

/// Wrap raw base64 image bytes in a data URI.
pub fn data_uri_from_base64(b64: &str) -> String {
    if b64.starts_with("data:image") {
        b64.to_string()
    } else {
        format!("data:image/png;base64,{b64}")
    }
}

/// Fetch a remote image and encode it as a data URI.
pub async fn fetch_image_as_data_uri(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(IMAGE_FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| MediError::Agent(format!("failed to build image client: {e}")))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediError::Agent(format!("image fetch failed: {e}")))?;
    if !response.status().is_success() {
        return Err(MediError::Agent(format!(
            "image fetch returned {}",
            response.status()
        )));
    }
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or("image/png")
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| MediError::Agent(format!("image read failed: {e}")))?;
    Ok(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
}

/// Read a local image file and encode it as a data URI.
pub fn read_image_as_data_uri(path: &str) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(&bytes)))
}
