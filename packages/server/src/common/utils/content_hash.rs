use sha2::{Digest, Sha256};

/// Fingerprint of a newsletter's extracted text, used as its dedup key.
///
/// Whitespace runs collapse to a single space and the ends are trimmed, so
/// HTML that differs only in indentation or line breaks hashes identically.
/// Case and punctuation are significant: two issues differing only in a
/// corrected typo are different issues.
pub fn generate_newsletter_hash(text: &str) -> String {
    let normalized = normalize_whitespace(text);

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
