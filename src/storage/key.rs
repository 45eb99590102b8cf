//! Storage key sanitizing.
//!
//! Maps arbitrary caller keys onto identifiers every backend accepts. This is
//! not a hash: distinct raw keys that differ only in replaced characters, or
//! only beyond the length cap, map to the same identifier.

/// Longest sanitized key body, excluding the namespace prefix.
pub const MAX_STORAGE_KEY_LENGTH: usize = 200;

/// Builds `<namespace><sanitized key>`.
///
/// Characters other than ASCII alphanumerics, `_`, `-` and `.` become `_`.
pub fn storage_key(namespace: &str, raw_key: &str) -> String {
    let sanitized: String = raw_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORAGE_KEY_LENGTH)
        .collect();

    format!("{}{}", namespace, sanitized)
}
