//! Result URL extraction.
//!
//! Response fields vary by backend and API version, so extraction tries a
//! small ordered list of named strategies, then falls back to a deep scan for
//! any string value that looks like a playable video reference. The deep scan
//! is an explicit last resort, never the primary path.

use serde_json::Value;
use tracing::debug;

/// One named way of pulling a video URL out of a backend response.
pub struct ExtractionStrategy {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<String>,
}

/// Try `strategies` in priority order, then deep-scan.
pub fn extract_video_url(value: &Value, strategies: &[ExtractionStrategy]) -> Option<String> {
    for strategy in strategies {
        if let Some(url) = (strategy.extract)(value) {
            debug!(strategy = strategy.name, "Extracted video url");
            return Some(url);
        }
    }
    let url = deep_scan(value);
    if url.is_some() {
        debug!("Extracted video url via deep scan fallback");
    }
    url
}

/// Depth-first scan for any string that looks like a playable video URL.
pub fn deep_scan(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if looks_like_video_url(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(deep_scan),
        Value::Object(map) => map.values().find_map(deep_scan),
        _ => None,
    }
}

const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".webm", ".mov", ".m3u8"];

fn looks_like_video_url(s: &str) -> bool {
    if !s.starts_with("http://") && !s.starts_with("https://") {
        return false;
    }
    // Ignore query strings when matching the extension.
    let path = s.split(['?', '#']).next().unwrap_or(s);
    VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || path.contains("/video/")
}

/// Navigate an object path of keys and array indices.
pub fn pluck_string(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for segment in path {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(segment)?,
        };
    }
    current.as_str().map(|s| s.to_string())
}
