//! Normalized request fingerprinting for deduplication and result caching.
//!
//! Two requests that differ only in field casing, surrounding whitespace or
//! client-supplied plumbing (`trace_id`) produce the same fingerprint.

use sha2::{Digest, Sha256};

use crate::request::GenerationRequest;

/// Collapses runs of whitespace, trims and lowercases a free-text field.
fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Computes the stable fingerprint of a request.
///
/// The semantically relevant fields are serialized in a fixed order, so the
/// result is independent of how the caller happened to order or format them.
/// `trace_id` is deliberately excluded.
pub fn fingerprint(request: &GenerationRequest) -> String {
    let canonical = format!(
        "theme={}\nstyle={}\nlanguage={}\nduration={}\nscenes={}",
        normalize(&request.theme),
        normalize(&request.style),
        normalize(&request.language),
        request.duration_secs,
        request.scene_count,
    );

    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::new("A Fox in the Snow", "watercolor", "en", 60, 4)
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint(&request()), fingerprint(&request()));
    }

    #[test]
    fn test_fingerprint_ignores_case_and_whitespace() {
        let mut other = request();
        other.theme = "  a fox   in the SNOW ".to_string();
        other.style = "Watercolor".to_string();
        assert_eq!(fingerprint(&request()), fingerprint(&other));
    }

    #[test]
    fn test_fingerprint_ignores_trace_id() {
        let mut other = request();
        other.trace_id = Some("trace-abc".to_string());
        assert_eq!(fingerprint(&request()), fingerprint(&other));
    }

    #[test]
    fn test_fingerprint_differs_on_content_fields() {
        let mut other = request();
        other.duration_secs = 90;
        assert_ne!(fingerprint(&request()), fingerprint(&other));

        let mut other = request();
        other.scene_count = 5;
        assert_ne!(fingerprint(&request()), fingerprint(&other));

        let mut other = request();
        other.theme = "a wolf in the snow".to_string();
        assert_ne!(fingerprint(&request()), fingerprint(&other));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint(&request());
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
