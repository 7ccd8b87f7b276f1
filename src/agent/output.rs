//! Cleanup of raw model replies into JSON or HTML.

use std::sync::LazyLock;

use regex::Regex;

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));
static ANY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid regex"));
static HTML_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```html\s*(.*?)\s*```").expect("valid regex"));
static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("valid regex"));
static STYLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s*style="[^"]*""#).expect("valid regex"));

/// The body of a ```` ```json ```` block if present, otherwise the trimmed
/// reply with any bare fence removed.
pub fn strip_json_fence(text: &str) -> &str {
    if let Some(inner) = JSON_FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str();
    }
    let trimmed = text.trim();
    match ANY_FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// Removes one leading ```` ```json ```` (or bare ```` ``` ````) and one
/// trailing ```` ``` ```` from the trimmed reply. Fences inside the payload
/// are left alone.
pub fn strip_outer_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Takes the ```` ```html ```` block, then the inner `<body>`, then drops
/// inline `style` attributes.
pub fn clean_html(text: &str) -> String {
    let fenced = HTML_FENCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);
    let body = BODY_RE
        .captures(fenced)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(fenced);
    STYLE_ATTR_RE.replace_all(body.trim(), "").into_owned()
}
