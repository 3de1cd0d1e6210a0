//! Group generators.
//!
//! Composition proofs work over three independent generators:
//!
//! ```text
//! G = ed25519 basepoint
//! X = Hp(Keccak256("quorum_generator_X"))
//! U = Hp(Keccak256("quorum_generator_U"))
//! ```
//!
//! `Hp` is Monero's hash-to-point (cofactor-cleared), so nobody knows the
//! discrete log of X or U with respect to G.

use curve25519_dalek::{
    constants::ED25519_BASEPOINT_POINT,
    edwards::{CompressedEdwardsY, EdwardsPoint},
};
use once_cell::sync::Lazy;
use sha3::{Digest, Keccak256};

const GENERATOR_X_DOMAIN: &[u8] = b"quorum_generator_X";
const GENERATOR_U_DOMAIN: &[u8] = b"quorum_generator_U";

static GENERATOR_X: Lazy<EdwardsPoint> = Lazy::new(|| generator_from_domain(GENERATOR_X_DOMAIN));
static GENERATOR_U: Lazy<EdwardsPoint> = Lazy::new(|| generator_from_domain(GENERATOR_U_DOMAIN));

fn generator_from_domain(domain: &[u8]) -> EdwardsPoint {
    let seed: [u8; 32] = Keccak256::digest(domain).into();
    monero_hash_to_point(seed)
}

/// `monero-generators` is built on an older curve25519-dalek; carry its point
/// across via the canonical compressed encoding.
fn monero_hash_to_point(bytes: [u8; 32]) -> EdwardsPoint {
    let encoded = monero_generators::hash_to_point(bytes).compress().to_bytes();
    CompressedEdwardsY(encoded)
        .decompress()
        .expect("a valid curve point re-encodes losslessly")
}

/// G, the ed25519 basepoint.
#[inline]
#[must_use]
pub fn generator_g() -> EdwardsPoint {
    ED25519_BASEPOINT_POINT
}

/// X, the composition-proof "extension" generator.
#[inline]
#[must_use]
pub fn generator_x() -> EdwardsPoint {
    *GENERATOR_X
}

/// U, the key-image generator of composition proofs.
#[inline]
#[must_use]
pub fn generator_u() -> EdwardsPoint {
    *GENERATOR_U
}

/// Monero hash-to-point of a compressed key, `Hp(K)`.
#[inline]
#[must_use]
pub fn hash_to_point(key: &[u8; 32]) -> EdwardsPoint {
    monero_hash_to_point(*key)
}
