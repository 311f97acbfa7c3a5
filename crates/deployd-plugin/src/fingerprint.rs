//! Content fingerprint used as the plugin cache key (spec.md §4.6, build
//! pipeline step 1).

use sha2::{Digest, Sha256};

pub fn fingerprint(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_source_fingerprints_identically() {
        assert_eq!(fingerprint("fn Run(ctx) {}"), fingerprint("fn Run(ctx) {}"));
    }

    #[test]
    fn differing_source_fingerprints_differently() {
        assert_ne!(fingerprint("a"), fingerprint("b"));
    }
}
