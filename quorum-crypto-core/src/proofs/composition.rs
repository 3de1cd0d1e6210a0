//! Composition proofs.
//!
//! Proves knowledge of `(x, y, z)` with `K = x*G + y*X + z*U` and binds the
//! key image `KI = (z/y)*U` to `K`, without revealing any of them.
//!
//! ## Construction
//!
//! ```text
//! K_t1 = K / y
//! K_t2 = K_t1 - X - KI            (= (x/y) * G)
//!
//! c    = Hs(domain || m || K || K_t1 || K_t2 || KI
//!              || α_t1*K || α_t2*G || α_ki*U)
//! r_t1 = α_t1 - c/y
//! r_t2 = α_t2 - c*x/y
//! r_ki = α_ki - c*z/y
//! ```
//!
//! The verifier recomputes the three nonce points as `r*B + c*P` and checks
//! the challenge. The `α_ki` term is the only one that involves the
//! threshold-shared secret, so multisig signers share `α_ki` and `r_ki` and
//! agree on everything else.

use curve25519_dalek::{edwards::EdwardsPoint, traits::IsIdentity, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::hash::{ChallengeHasher, COMPOSITION_DOMAIN};
use crate::keys::encoding::{bytes_to_point, bytes_to_prime_order_point, bytes_to_scalar, point_to_bytes};
use crate::keys::generators::{generator_g, generator_u, generator_x};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::serde_hex;

/// A finished composition proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionProof {
    /// Challenge `c`
    #[serde(with = "serde_hex::bytes32")]
    pub c: [u8; 32],
    /// Response for `K_t1`
    #[serde(with = "serde_hex::bytes32")]
    pub r_t1: [u8; 32],
    /// Response for `K_t2`
    #[serde(with = "serde_hex::bytes32")]
    pub r_t2: [u8; 32],
    /// Response for the key image
    #[serde(with = "serde_hex::bytes32")]
    pub r_ki: [u8; 32],
    /// `K_t1 = K / y`
    #[serde(with = "serde_hex::bytes32")]
    pub k_t1: [u8; 32],
    /// `KI = (z / y) * U`
    #[serde(with = "serde_hex::bytes32")]
    pub key_image: [u8; 32],
}

/// `1/y`, rejecting zero.
///
/// # Errors
///
/// `InvalidSecretKey` if `y` is zero.
pub fn invert_nonzero(y: &Scalar, field: &str) -> CryptoResult<Scalar> {
    if *y == Scalar::ZERO {
        return Err(CryptoError::InvalidSecretKey(format!("{field} is zero")));
    }
    Ok(y.invert())
}

/// Key image of a composition proof key, `KI = (1/y) * (z*U)`.
///
/// Takes `z*U` rather than `z` so the group can compute it from the public
/// spend key on U plus the known offset.
///
/// # Errors
///
/// `InvalidSecretKey` if `y` is zero.
pub fn composition_key_image(y: &Scalar, z_u: &EdwardsPoint) -> CryptoResult<EdwardsPoint> {
    Ok(invert_nonzero(y, "y")? * z_u)
}

/// `(K_t1, K_t2)` for a proof key, its key image and `1/y`.
#[must_use]
pub fn composition_proof_parts(
    proof_key: &EdwardsPoint,
    key_image: &EdwardsPoint,
    y_inv: &Scalar,
) -> (EdwardsPoint, EdwardsPoint) {
    let k_t1 = y_inv * proof_key;
    let k_t2 = k_t1 - generator_x() - key_image;
    (k_t1, k_t2)
}

/// The composition proof challenge.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn composition_challenge(
    message: &[u8; 32],
    proof_key: &EdwardsPoint,
    k_t1: &EdwardsPoint,
    k_t2: &EdwardsPoint,
    key_image: &EdwardsPoint,
    nonce_t1: &EdwardsPoint,
    nonce_t2: &EdwardsPoint,
    nonce_ki: &EdwardsPoint,
) -> Scalar {
    let mut hasher = ChallengeHasher::new(COMPOSITION_DOMAIN);
    hasher
        .bytes(message)
        .point(proof_key)
        .point(k_t1)
        .point(k_t2)
        .point(key_image)
        .point(nonce_t1)
        .point(nonce_t2)
        .point(nonce_ki);
    hasher.finalize()
}

/// Single-party composition proof.
///
/// # Errors
///
/// - `InvalidSecretKey` if `y` is zero
/// - `InvalidProposal` if `(x, y, z)` do not open `proof_key`
pub fn prove_composition<R: RngCore + CryptoRng>(
    message: &[u8; 32],
    proof_key: &EdwardsPoint,
    x: &Scalar,
    y: &Scalar,
    z: &Scalar,
    rng: &mut R,
) -> CryptoResult<CompositionProof> {
    let y_inv = invert_nonzero(y, "y")?;
    if x * generator_g() + y * generator_x() + z * generator_u() != *proof_key {
        return Err(CryptoError::InvalidProposal(
            "secrets do not open the proof key".into(),
        ));
    }

    let key_image = (z * y_inv) * generator_u();
    let (k_t1, k_t2) = composition_proof_parts(proof_key, &key_image, &y_inv);

    let alpha_t1 = Scalar::random(rng);
    let alpha_t2 = Scalar::random(rng);
    let alpha_ki = Scalar::random(rng);

    let c = composition_challenge(
        message,
        proof_key,
        &k_t1,
        &k_t2,
        &key_image,
        &(alpha_t1 * proof_key),
        &(alpha_t2 * generator_g()),
        &(alpha_ki * generator_u()),
    );

    Ok(CompositionProof {
        c: c.to_bytes(),
        r_t1: (alpha_t1 - c * y_inv).to_bytes(),
        r_t2: (alpha_t2 - c * x * y_inv).to_bytes(),
        r_ki: (alpha_ki - c * z * y_inv).to_bytes(),
        k_t1: point_to_bytes(&k_t1),
        key_image: point_to_bytes(&key_image),
    })
}

/// Verify a composition proof for `proof_key` on `message`.
#[must_use]
pub fn verify_composition(proof: &CompositionProof, message: &[u8; 32], proof_key: &[u8; 32]) -> bool {
    verify_composition_inner(proof, message, proof_key).unwrap_or(false)
}

fn verify_composition_inner(
    proof: &CompositionProof,
    message: &[u8; 32],
    proof_key: &[u8; 32],
) -> CryptoResult<bool> {
    let proof_key = bytes_to_prime_order_point(proof_key, "proof_key")?;
    let key_image = bytes_to_prime_order_point(&proof.key_image, "key_image")?;
    let k_t1 = bytes_to_point(&proof.k_t1, "k_t1")?;
    if k_t1.is_identity() {
        return Ok(false);
    }
    let c = bytes_to_scalar(&proof.c, "c")?;
    let r_t1 = bytes_to_scalar(&proof.r_t1, "r_t1")?;
    let r_t2 = bytes_to_scalar(&proof.r_t2, "r_t2")?;
    let r_ki = bytes_to_scalar(&proof.r_ki, "r_ki")?;

    let k_t2 = k_t1 - generator_x() - key_image;
    let nonce_t1 = r_t1 * proof_key + c * k_t1;
    let nonce_t2 = r_t2 * generator_g() + c * k_t2;
    let nonce_ki = r_ki * generator_u() + c * key_image;

    let expected = composition_challenge(
        message, &proof_key, &k_t1, &k_t2, &key_image, &nonce_t1, &nonce_t2, &nonce_ki,
    );
    Ok(expected == c)
}
