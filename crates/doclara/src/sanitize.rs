//! Helpers for keeping document text and credentials out of logs and spans.
//!
//! Extracted text is personal data (names, addresses, amounts). Log lines and
//! span attributes only ever carry a bounded preview, a hash, or a length.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

const PREVIEW_CHARS: usize = 40;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks a bearer token, keeping at most the first four characters.
///
/// - `eyJhbGciOi...` → `eyJh****`
/// - tokens of eight characters or fewer → `****`
/// - empty → `<none>`
pub fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return "<none>".to_string();
    }
    if token.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = token.chars().take(4).collect();
    format!("{}****", head)
}

/// First characters of `text` on a single line, with an ellipsis when cut.
pub fn preview(text: &str) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let mut chars = flattened.trim().chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Returns a short deterministic hash of `text` for correlating log lines
/// about the same document without logging its content.
pub fn hash_text(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Returns the first `max_chars` characters of `text`, never splitting a
/// multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
