//! Conversation thread identifiers.
//!
//! A thread id has the shape `user_<user_id>_<suffix>`. The user id is always
//! the second `_`-delimited segment, so user ids themselves must not contain
//! `_`. Persistence derives the owning user from the thread id alone.

use uuid::Uuid;

pub const THREAD_PREFIX: &str = "user";
pub const SEPARATOR: char = '_';

const SUFFIX_LEN: usize = 12;

/// Creates a fresh thread id for `user_id` with a random 12-hex-char suffix.
pub fn generate(user_id: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string();
    format!("{THREAD_PREFIX}{SEPARATOR}{user_id}{SEPARATOR}{suffix}")
}

/// Binds a client-supplied thread id to the authenticated user.
///
/// - no id: a new one is generated
/// - `user_<user_id>_...` for this user: kept as is
/// - `user_<other>_<suffix>...`: the suffix is kept, the user segment replaced
/// - `user_<x>` without a suffix: a new one is generated
/// - anything else is treated as a suffix: `user_<user_id>_<requested>`
pub fn normalize(requested: Option<&str>, user_id: &str) -> String {
    let requested = match requested.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r,
        None => return generate(user_id),
    };

    let own_prefix = format!("{THREAD_PREFIX}{SEPARATOR}{user_id}{SEPARATOR}");
    if requested.starts_with(&own_prefix) {
        return requested.to_string();
    }

    let generic_prefix = format!("{THREAD_PREFIX}{SEPARATOR}");
    if requested.starts_with(&generic_prefix) {
        return match requested.split(SEPARATOR).nth(2) {
            Some(suffix) if !suffix.is_empty() => format!("{own_prefix}{suffix}"),
            _ => generate(user_id),
        };
    }

    format!("{own_prefix}{requested}")
}

/// Extracts the user id segment from a thread id, if it has the expected shape.
pub fn user_id_from_thread_id(thread_id: &str) -> Option<&str> {
    let mut parts = thread_id.split(SEPARATOR);
    if parts.next() != Some(THREAD_PREFIX) {
        return None;
    }
    parts.next().filter(|user_id| !user_id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_thread_id() {
        assert_eq!(user_id_from_thread_id("user_42_ab12cd"), Some("42"));
        assert_eq!(user_id_from_thread_id("user_42"), Some("42"));
        assert_eq!(
            user_id_from_thread_id("user_9f1c-uuid_0011aabbccdd"),
            Some("9f1c-uuid")
        );
    }

    #[test]
    fn test_user_id_from_malformed_thread_id() {
        assert_eq!(user_id_from_thread_id(""), None);
        assert_eq!(user_id_from_thread_id("user_"), None);
        assert_eq!(user_id_from_thread_id("user"), None);
        assert_eq!(user_id_from_thread_id("session_42_ab"), None);
        assert_eq!(user_id_from_thread_id("user__ab"), None);
    }

    #[test]
    fn test_generate_shape() {
        let id = generate("42");
        assert!(id.starts_with("user_42_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(user_id_from_thread_id(&id), Some("42"));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(generate("42"), generate("42"));
    }

    #[test]
    fn test_normalize_missing_generates() {
        assert!(normalize(None, "42").starts_with("user_42_"));
        assert!(normalize(Some("   "), "42").starts_with("user_42_"));
    }

    #[test]
    fn test_normalize_keeps_own_thread() {
        assert_eq!(normalize(Some("user_42_abc"), "42"), "user_42_abc");
    }

    #[test]
    fn test_normalize_rebinds_foreign_thread() {
        assert_eq!(normalize(Some("user_7_abc"), "42"), "user_42_abc");
    }

    #[test]
    fn test_normalize_prefix_without_suffix_generates() {
        let id = normalize(Some("user_7"), "42");
        assert!(id.starts_with("user_42_"));
        assert_ne!(id, "user_42_");
    }

    #[test]
    fn test_normalize_plain_value_becomes_suffix() {
        assert_eq!(normalize(Some("chat-1"), "42"), "user_42_chat-1");
    }
}
