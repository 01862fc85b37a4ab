//! Log Redaction Layer
//!
//! Scrubs API keys, bearer tokens and inline base64 images from strings prior
//! to logging.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9_\-]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:[a-zA-Z]+/[a-zA-Z0-9.+\-]+;base64,[A-Za-z0-9+/=]+").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    DATA_URL_RE.replace_all(&redacted, "[REDACTED_IMAGE]").into_owned()
}

/// Redacted, single-line, length-limited view of untrusted text for log fields.
pub fn excerpt(input: &str, max_chars: usize) -> String {
    let redacted = redact_sensitive_data(input);
    let flat: String = redacted.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "calling with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9 and sk-abcdefghijklmnopqrstuvwxyz012345";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(!clean.contains("sk-abcdefghijklmnopqrstuvwxyz012345"));
        assert!(clean.contains("[REDACTED_TOKEN]"));
    }

    #[test]
    fn strips_inline_images() {
        let clean = redact_sensitive_data("img=data:image/png;base64,iVBORw0KGgoAAAANSUhEUg== end");
        assert_eq!(clean, "img=[REDACTED_IMAGE] end");
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n  b\tc", 10), "a b c");
        assert_eq!(excerpt("abcdefghij", 4), "abcd…");
    }
}
