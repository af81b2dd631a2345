//! Tag filtering and rendering.

use crate::config::NotifierConfig;

/// Prefix the host puts on its built-in tag keys (`sentry:release`).
const RESERVED_PREFIX: &str = "sentry:";

/// Strip the host's reserved prefix from a lower-cased key.
fn standardized_key(key: &str) -> &str {
    key.strip_prefix(RESERVED_PREFIX).unwrap_or(key)
}

/// Whether a tag key passes the include/exclude lists.
///
/// Keys compare case-insensitively, both raw and standardized.
#[must_use]
pub fn is_tag_allowed(key: &str, included: &[String], excluded: &[String]) -> bool {
    let key = key.to_lowercase();
    let std_key = standardized_key(&key);
    let listed = |list: &[String]| list.iter().any(|k| k == &key || k == std_key);

    if !included.is_empty() && !listed(included) {
        return false;
    }
    !listed(excluded)
}

/// Render tags as backtick-quoted labels separated by single spaces.
///
/// Order follows the event. An empty (or fully filtered) tag list renders as
/// an empty string.
#[must_use]
pub fn render_tags(tags: &[(String, String)], config: &NotifierConfig) -> String {
    tags.iter()
        .filter(|(key, _)| {
            is_tag_allowed(key, &config.included_tag_keys, &config.excluded_tag_keys)
        })
        .map(|(key, value)| {
            if config.include_keys_with_tags {
                format!("`{key}:{value}`")
            } else {
                format!("`{value}`")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
