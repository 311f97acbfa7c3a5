//! The `X-Master-Key` channel (spec.md §4.2, channel 2).

use subtle::ConstantTimeEq;

/// Compares `provided` to `configured` in constant time, regardless of a
/// length mismatch, so timing leaks no information about the configured key.
pub fn matches(provided: &str, configured: &str) -> bool {
    let provided = provided.as_bytes();
    let configured = configured.as_bytes();
    if provided.len() != configured.len() {
        return false;
    }
    provided.ct_eq(configured).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_match() {
        assert!(matches("s3cret", "s3cret"));
    }

    #[test]
    fn rejects_mismatch() {
        assert!(!matches("wrong", "s3cret"));
    }

    #[test]
    fn rejects_different_length_without_panicking() {
        assert!(!matches("short", "a-much-longer-master-key"));
    }
}
