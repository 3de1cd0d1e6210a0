//! Keccak challenge hashing shared by both proof families and the binonce
//! merge.
//!
//! Every hash starts with a domain separator padded to a 32-byte key slot,
//! followed by 32-byte fields in a fixed order.

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use sha3::{Digest, Keccak256};

/// CLSAG round hash domain separator.
pub const CLSAG_ROUND_DOMAIN: &[u8] = b"CLSAG_round";

/// CLSAG aggregation domain separator for `μ_P`.
pub const CLSAG_AGG_0: &[u8] = b"CLSAG_agg_0";

/// CLSAG aggregation domain separator for `μ_C`.
pub const CLSAG_AGG_1: &[u8] = b"CLSAG_agg_1";

/// Composition proof challenge domain separator.
pub const COMPOSITION_DOMAIN: &[u8] = b"quorum_composition_proof";

/// MuSig2 binonce merge factor domain separator.
pub const BINONCE_MERGE_DOMAIN: &[u8] = b"quorum_binonce_merge";

/// Pad a domain separator to 32 bytes.
#[inline]
#[must_use]
pub fn pad_domain_separator(domain: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = domain.len().min(32);
    padded[..len].copy_from_slice(&domain[..len]);
    padded
}

/// Hash-to-scalar (`Hs`): Keccak256 reduced mod l.
#[inline]
#[must_use]
pub fn keccak256_to_scalar(data: &[u8]) -> Scalar {
    let hash = Keccak256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    Scalar::from_bytes_mod_order(bytes)
}

/// Incremental domain-separated `Hs`.
#[derive(Clone)]
pub struct ChallengeHasher {
    hasher: Keccak256,
}

impl ChallengeHasher {
    /// Start a hash under `domain`.
    #[must_use]
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(pad_domain_separator(domain));
        Self { hasher }
    }

    /// Append raw 32-byte field.
    pub fn bytes(&mut self, bytes: &[u8; 32]) -> &mut Self {
        self.hasher.update(bytes);
        self
    }

    /// Append a point's compressed encoding.
    pub fn point(&mut self, point: &EdwardsPoint) -> &mut Self {
        self.hasher.update(point.compress().as_bytes());
        self
    }

    /// Append every point of a slice, in order.
    pub fn points(&mut self, points: &[EdwardsPoint]) -> &mut Self {
        for point in points {
            self.point(point);
        }
        self
    }

    /// Finish and reduce to a scalar.
    #[must_use]
    pub fn finalize(self) -> Scalar {
        let hash = self.hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Scalar::from_bytes_mod_order(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;

    #[test]
    fn test_pad_domain_separator() {
        let padded = pad_domain_separator(CLSAG_ROUND_DOMAIN);
        assert_eq!(&padded[..11], CLSAG_ROUND_DOMAIN);
        assert_eq!(&padded[11..], &[0u8; 21]);
    }

    #[test]
    fn test_hasher_matches_one_shot() {
        let g = ED25519_BASEPOINT_POINT;
        let mut data = pad_domain_separator(COMPOSITION_DOMAIN).to_vec();
        data.extend_from_slice(&[7u8; 32]);
        data.extend_from_slice(g.compress().as_bytes());

        let mut hasher = ChallengeHasher::new(COMPOSITION_DOMAIN);
        hasher.bytes(&[7u8; 32]).point(&g);
        assert_eq!(hasher.finalize(), keccak256_to_scalar(&data));
    }

    #[test]
    fn test_domains_separate() {
        let mut a = ChallengeHasher::new(CLSAG_AGG_0);
        a.bytes(&[1u8; 32]);
        let mut b = ChallengeHasher::new(CLSAG_AGG_1);
        b.bytes(&[1u8; 32]);
        assert_ne!(a.finalize(), b.finalize());
    }
}
