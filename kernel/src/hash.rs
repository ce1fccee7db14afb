//! Domain-separated content hashing.
//!
//! Exactly one place defines canonical hashing for the workspace. Every
//! digest is SHA-256 over a null-terminated domain prefix followed by the
//! payload bytes, rendered as `"sha256:<hex>"`.

use sha2::{Digest, Sha256};

/// A content-addressed digest in `"sha256:hex"` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse from `"sha256:hex"` form.
    ///
    /// Returns `None` unless the algorithm is exactly `sha256` and the
    /// digest is 64 lowercase hex characters.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let digest = s.strip_prefix("sha256:")?;
        if digest.len() != 64 {
            return None;
        }
        if !digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        Some(Self(s.to_string()))
    }

    /// The full `"sha256:hex"` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex digest without the algorithm prefix.
    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.0["sha256:".len()..]
    }

    /// Map this digest onto `[0, 1)` deterministically.
    ///
    /// Used as a subsampling gate: comparing the fraction against a rate
    /// keeps sampling decisions reproducible without a random number
    /// generator.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn unit_fraction(&self) -> f64 {
        // The digest is always 64 hex chars; the leading 16 give 64 bits.
        let bits = u64::from_str_radix(&self.hex_digest()[..16], 16)
            .unwrap_or_default();
        bits as f64 / (u64::MAX as f64 + 1.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Domain separation constants, null-terminated.

/// Goal identity digests in artifacts.
pub const DOMAIN_GOAL: &[u8] = b"HYPERTREE::GOAL::V1\0";

/// Effect deduplication keys.
pub const DOMAIN_EFFECT: &[u8] = b"HYPERTREE::EFFECT::V1\0";

/// Deterministic subsampling gates for training samples.
pub const DOMAIN_SAMPLE_GATE: &[u8] = b"HYPERTREE::SAMPLE_GATE::V1\0";

/// Search state snapshot digests.
pub const DOMAIN_STATE: &[u8] = b"HYPERTREE::STATE::V1\0";

/// Compute `sha256(domain || data)` with domain separation.
///
/// The domain prefix must include its null terminator; all `DOMAIN_*`
/// constants in this module already do.
#[must_use]
pub fn canonical_hash(domain: &[u8], data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    let hex = hex::encode(hasher.finalize());
    ContentHash(format!("sha256:{hex}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_valid_digest() {
        let h = canonical_hash(DOMAIN_GOAL, b"g");
        let parsed = ContentHash::parse(h.as_str()).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(parsed.hex_digest().len(), 64);
    }

    #[test]
    fn parse_rejects_bad_forms() {
        assert!(ContentHash::parse("nocolon").is_none());
        assert!(ContentHash::parse("md5:abcd").is_none());
        assert!(ContentHash::parse("sha256:abc").is_none());
        let upper = format!("sha256:{}", "A".repeat(64));
        assert!(ContentHash::parse(&upper).is_none());
        let bad_char = format!("sha256:{}", "g".repeat(64));
        assert!(ContentHash::parse(&bad_char).is_none());
    }

    #[test]
    fn domains_are_null_terminated() {
        for domain in [DOMAIN_GOAL, DOMAIN_EFFECT, DOMAIN_SAMPLE_GATE, DOMAIN_STATE] {
            assert!(domain.ends_with(&[0]));
        }
    }

    #[test]
    fn domains_separate() {
        let a = canonical_hash(DOMAIN_GOAL, b"same");
        let b = canonical_hash(DOMAIN_EFFECT, b"same");
        assert_ne!(a, b);
    }

    #[test]
    fn hashing_is_deterministic() {
        let first = canonical_hash(DOMAIN_SAMPLE_GATE, b"goal-1");
        for _ in 0..5 {
            assert_eq!(canonical_hash(DOMAIN_SAMPLE_GATE, b"goal-1"), first);
        }
    }

    #[test]
    fn unit_fraction_is_in_range_and_stable() {
        for payload in ["a", "b", "c", "∧"] {
            let h = canonical_hash(DOMAIN_SAMPLE_GATE, payload.as_bytes());
            let f = h.unit_fraction();
            assert!((0.0..1.0).contains(&f), "fraction {f} out of range");
            assert!((h.unit_fraction() - f).abs() < f64::EPSILON);
        }
    }
}
