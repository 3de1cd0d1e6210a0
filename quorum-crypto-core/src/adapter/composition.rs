//! Threshold composition proofs.
//!
//! The group knows `x`, `y` and an offset `z_offset`; only the spend key
//! `k_s` in `z = k_s + z_offset` is Shamir-shared. So the `K_t1` and `K_t2`
//! legs are computed identically by every signer from the proposal's nonces,
//! and only the key-image leg is split:
//!
//! ```text
//! z_e      = λ_e(F)*s_e + z_offset/T
//! r_ki_e   = (a1_e + ρ*a2_e) - c*z_e/y
//! r_ki     = Σ r_ki_e
//! ```

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CompletedProof, PartialSignature, ProofKind, ProofProposal, ProofRequest, ProofSecrets};
use crate::filter::SignerSetFilter;
use crate::keys::encoding::{bytes_to_prime_order_point, bytes_to_scalar, point_to_bytes};
use crate::keys::generators::{generator_g, generator_u, generator_x};
use crate::nonce::{BinonceAggregate, NoncePubkeys, NonceRecordKey, NonceVault};
use crate::proofs::composition::{
    composition_challenge, composition_key_image, composition_proof_parts, invert_nonzero,
    verify_composition, CompositionProof,
};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::serde_hex;

/// What every signer agrees on before round 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionProofProposal {
    message: [u8; 32],
    proof_key: [u8; 32],
    key_image: [u8; 32],
    alpha_t1: [u8; 32],
    alpha_t2: [u8; 32],
}

impl CompositionProofProposal {
    /// Message to sign.
    #[must_use]
    pub fn message(&self) -> &[u8; 32] {
        &self.message
    }

    /// `K`.
    #[must_use]
    pub fn proof_key(&self) -> &[u8; 32] {
        &self.proof_key
    }

    /// `KI`.
    #[must_use]
    pub fn key_image(&self) -> &[u8; 32] {
        &self.key_image
    }

    /// Nonce base points: U only.
    #[must_use]
    pub fn nonce_base_points(&self) -> Vec<EdwardsPoint> {
        vec![generator_u()]
    }
}

/// Group-known private context of a composition proof.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CompositionSecrets {
    x: Scalar,
    y: Scalar,
    z_offset: Scalar,
}

/// One signer's share of a composition proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionPartial {
    /// Message signed
    #[serde(with = "serde_hex::bytes32")]
    pub message: [u8; 32],
    /// `K`
    #[serde(with = "serde_hex::bytes32")]
    pub proof_key: [u8; 32],
    /// `KI`
    #[serde(with = "serde_hex::bytes32")]
    pub key_image: [u8; 32],
    /// `K_t1`
    #[serde(with = "serde_hex::bytes32")]
    pub k_t1: [u8; 32],
    /// Challenge
    #[serde(with = "serde_hex::bytes32")]
    pub c: [u8; 32],
    /// `r_t1` (identical across signers)
    #[serde(with = "serde_hex::bytes32")]
    pub r_t1: [u8; 32],
    /// `r_t2` (identical across signers)
    #[serde(with = "serde_hex::bytes32")]
    pub r_t2: [u8; 32],
    /// This signer's share of `r_ki`
    #[serde(with = "serde_hex::bytes32")]
    pub r_ki_partial: [u8; 32],
}

impl CompositionPartial {
    fn shares_proof_with(&self, other: &Self) -> bool {
        self.message == other.message
            && self.proof_key == other.proof_key
            && self.key_image == other.key_image
            && self.k_t1 == other.k_t1
            && self.c == other.c
            && self.r_t1 == other.r_t1
            && self.r_t2 == other.r_t2
    }
}

/// Build a composition proof request for `K = x*G + y*X + (z_offset + k_s)*U`.
///
/// `group_spend_key_u` is `k_s * U`.
///
/// # Errors
///
/// `InvalidSecretKey` if `y` is zero.
pub fn propose_composition<R: RngCore + CryptoRng>(
    message: [u8; 32],
    x: Scalar,
    y: Scalar,
    z_offset: Scalar,
    group_spend_key_u: &EdwardsPoint,
    rng: &mut R,
) -> CryptoResult<ProofRequest> {
    let z_u = z_offset * generator_u() + group_spend_key_u;
    let key_image = composition_key_image(&y, &z_u)?;
    let proof_key = x * generator_g() + y * generator_x() + z_u;

    let proposal = CompositionProofProposal {
        message,
        proof_key: point_to_bytes(&proof_key),
        key_image: point_to_bytes(&key_image),
        alpha_t1: Scalar::random(rng).to_bytes(),
        alpha_t2: Scalar::random(rng).to_bytes(),
    };

    Ok(ProofRequest {
        proposal: ProofProposal::Composition(proposal),
        secrets: ProofSecrets::Composition(CompositionSecrets { x, y, z_offset }),
    })
}

pub(super) fn attempt_partial_signature(
    proposal: &CompositionProofProposal,
    secrets: &CompositionSecrets,
    signing_key: &Scalar,
    threshold_inv: &Scalar,
    filter_nonces: &[&[NoncePubkeys]],
    filter: SignerSetFilter,
    vault: &NonceVault,
) -> CryptoResult<PartialSignature> {
    let proof_key = bytes_to_prime_order_point(&proposal.proof_key, "proof_key")?;
    let key_image = bytes_to_prime_order_point(&proposal.key_image, "key_image")?;
    let alpha_t1 = bytes_to_scalar(&proposal.alpha_t1, "alpha_t1")?;
    let alpha_t2 = bytes_to_scalar(&proposal.alpha_t2, "alpha_t2")?;
    let y_inv = invert_nonzero(&secrets.y, "y")?;
    let (k_t1, k_t2) = composition_proof_parts(&proof_key, &key_image, &y_inv);

    let aggregate = BinonceAggregate::compute(
        &proposal.message,
        &proposal.proof_key,
        filter_nonces,
        ProofKind::Composition.required_base_point_count(),
    )?;

    let c = composition_challenge(
        &proposal.message,
        &proof_key,
        &k_t1,
        &k_t2,
        &key_image,
        &(alpha_t1 * proof_key),
        &(alpha_t2 * generator_g()),
        &aggregate.nonces[0],
    );

    let z_share = signing_key + secrets.z_offset * threshold_inv;
    let nonces = vault.consume(&NonceRecordKey::new(
        proposal.message,
        proposal.proof_key,
        filter,
    ))?;
    let r_ki_partial = *nonces.merged(&aggregate.rho) - c * z_share * y_inv;

    Ok(PartialSignature::Composition(CompositionPartial {
        message: proposal.message,
        proof_key: proposal.proof_key,
        key_image: proposal.key_image,
        k_t1: point_to_bytes(&k_t1),
        c: c.to_bytes(),
        r_t1: (alpha_t1 - c * y_inv).to_bytes(),
        r_t2: (alpha_t2 - c * secrets.x * y_inv).to_bytes(),
        r_ki_partial: r_ki_partial.to_bytes(),
    }))
}

pub(super) fn finalize(
    proposal: &CompositionProofProposal,
    partials: &[&CompositionPartial],
) -> CryptoResult<CompletedProof> {
    let first = partials
        .first()
        .ok_or_else(|| CryptoError::AssemblyFailed("no partial signatures".into()))?;
    if first.message != proposal.message
        || first.proof_key != proposal.proof_key
        || first.key_image != proposal.key_image
    {
        return Err(CryptoError::AssemblyFailed(
            "partial signature does not match the proposal".into(),
        ));
    }
    if !partials.iter().all(|p| p.shares_proof_with(first)) {
        return Err(CryptoError::AssemblyFailed(
            "partial signatures disagree on the shared proof terms".into(),
        ));
    }

    let mut r_ki = Scalar::ZERO;
    for partial in partials {
        r_ki += bytes_to_scalar(&partial.r_ki_partial, "r_ki_partial")
            .map_err(|e| CryptoError::AssemblyFailed(e.to_string()))?;
    }

    let proof = CompositionProof {
        c: first.c,
        r_t1: first.r_t1,
        r_t2: first.r_t2,
        r_ki: r_ki.to_bytes(),
        k_t1: first.k_t1,
        key_image: first.key_image,
    };
    if !verify_composition(&proof, &proposal.message, &proposal.proof_key) {
        return Err(CryptoError::AssemblyFailed(
            "assembled composition proof does not verify".into(),
        ));
    }

    Ok(CompletedProof::Composition {
        message: proposal.message,
        proof_key: proposal.proof_key,
        proof,
    })
}
