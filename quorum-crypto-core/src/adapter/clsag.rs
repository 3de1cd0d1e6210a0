//! Threshold CLSAG.
//!
//! Decoy responses are drawn when the proposal is made, so every signer
//! closes the ring identically once the aggregate nonces on `G` and
//! `Hp(K_l)` are known. Only the real response is split:
//!
//! ```text
//! k_e   = λ_e(F)*s_e + k_offset/T
//! s_l,e = (a1_e + ρ*a2_e) - c_l*(μ_P*k_e + μ_C*z/T)
//! s_l   = Σ s_l,e
//! ```

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CompletedProof, PartialSignature, ProofKind, ProofProposal, ProofRequest, ProofSecrets};
use crate::filter::SignerSetFilter;
use crate::keys::encoding::{bytes_to_point, bytes_to_scalar, point_to_bytes};
use crate::keys::generators::{generator_g, hash_to_point};
use crate::nonce::{BinonceAggregate, NoncePubkeys, NonceRecordKey, NonceVault};
use crate::proofs::clsag::{verify_clsag, ClsagProof, ClsagTranscript, RingMember, MIN_RING_SIZE};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::serde_hex;

/// What every signer agrees on before round 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsagProofProposal {
    message: [u8; 32],
    ring: Vec<RingMember>,
    pseudo_out: [u8; 32],
    real_index: usize,
    key_image: [u8; 32],
    d_inv8: [u8; 32],
    decoy_responses: Vec<[u8; 32]>,
}

impl ClsagProofProposal {
    /// Message to sign.
    #[must_use]
    pub fn message(&self) -> &[u8; 32] {
        &self.message
    }

    /// The real member's key `K_l`.
    #[must_use]
    pub fn proof_key(&self) -> &[u8; 32] {
        &self.ring[self.real_index].key
    }

    /// The ring.
    #[must_use]
    pub fn ring(&self) -> &[RingMember] {
        &self.ring
    }

    /// Pseudo-output commitment `C'`.
    #[must_use]
    pub fn pseudo_out(&self) -> &[u8; 32] {
        &self.pseudo_out
    }

    /// Index of the real member.
    #[must_use]
    pub fn real_index(&self) -> usize {
        self.real_index
    }

    /// `KI`.
    #[must_use]
    pub fn key_image(&self) -> &[u8; 32] {
        &self.key_image
    }

    /// Nonce base points: `G` then `Hp(K_l)`.
    #[must_use]
    pub fn nonce_base_points(&self) -> Vec<EdwardsPoint> {
        vec![generator_g(), hash_to_point(self.proof_key())]
    }

    fn transcript(&self) -> CryptoResult<ClsagTranscript> {
        ClsagTranscript::new(
            &self.message,
            &self.ring,
            &self.pseudo_out,
            &self.key_image,
            &self.d_inv8,
        )
    }
}

/// Group-known private context of a CLSAG.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClsagSecrets {
    k_offset: Scalar,
    commitment_mask: Scalar,
}

/// One signer's share of a CLSAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClsagPartial {
    /// Message signed
    #[serde(with = "serde_hex::bytes32")]
    pub message: [u8; 32],
    /// `K_l`
    #[serde(with = "serde_hex::bytes32")]
    pub proof_key: [u8; 32],
    /// Challenge entering index 0
    #[serde(with = "serde_hex::bytes32")]
    pub c_0: [u8; 32],
    /// `KI`
    #[serde(with = "serde_hex::bytes32")]
    pub key_image: [u8; 32],
    /// `D / 8`
    #[serde(with = "serde_hex::bytes32")]
    pub d_inv8: [u8; 32],
    /// Responses for every ring member; the real slot holds zero
    #[serde(with = "serde_hex::bytes32_vec")]
    pub responses: Vec<[u8; 32]>,
    /// This signer's share of the real response
    #[serde(with = "serde_hex::bytes32")]
    pub s_partial: [u8; 32],
}

impl ClsagPartial {
    fn shares_proof_with(&self, other: &Self) -> bool {
        self.message == other.message
            && self.proof_key == other.proof_key
            && self.c_0 == other.c_0
            && self.key_image == other.key_image
            && self.d_inv8 == other.d_inv8
            && self.responses == other.responses
    }
}

/// Build a CLSAG request spending `ring[real_index]`.
///
/// The real key is `k = k_s + k_offset` with `k_s` Shamir-shared;
/// `key_image` is `k * Hp(K_l)`, computed cooperatively beforehand.
/// `commitment_mask` opens `C_l - C'` on `G`.
///
/// # Errors
///
/// - `RingSizeTooSmall` / `SignerIndexOutOfBounds` for a bad ring
/// - `InvalidSecretKey` if `commitment_mask` does not open `C_l - C'`
/// - `InvalidPublicKey` on undecodable ring points
#[allow(clippy::too_many_arguments)]
pub fn propose_clsag<R: RngCore + CryptoRng>(
    message: [u8; 32],
    ring: Vec<RingMember>,
    pseudo_out: [u8; 32],
    real_index: usize,
    key_image: [u8; 32],
    k_offset: Scalar,
    commitment_mask: Scalar,
    rng: &mut R,
) -> CryptoResult<ProofRequest> {
    if ring.len() < MIN_RING_SIZE {
        return Err(CryptoError::RingSizeTooSmall {
            actual: ring.len(),
            minimum: MIN_RING_SIZE,
        });
    }
    let real = ring.get(real_index).ok_or(CryptoError::SignerIndexOutOfBounds {
        index: real_index,
        ring_size: ring.len(),
    })?;
    let real_commitment = bytes_to_point(&real.commitment, "ring[real].commitment")?;
    let pseudo_point = bytes_to_point(&pseudo_out, "pseudo_out")?;
    if commitment_mask * generator_g() != real_commitment - pseudo_point {
        return Err(CryptoError::InvalidSecretKey(
            "commitment mask does not open C_l - C'".into(),
        ));
    }

    let d = commitment_mask * hash_to_point(&real.key);
    let d_inv8 = point_to_bytes(&(Scalar::from(8u64).invert() * d));
    let decoy_responses = (0..ring.len())
        .map(|i| {
            if i == real_index {
                [0u8; 32]
            } else {
                Scalar::random(rng).to_bytes()
            }
        })
        .collect();

    let proposal = ClsagProofProposal {
        message,
        ring,
        pseudo_out,
        real_index,
        key_image,
        d_inv8,
        decoy_responses,
    };
    // Catches an undecodable ring or a bad key image before round 1.
    proposal.transcript()?;

    Ok(ProofRequest {
        proposal: ProofProposal::Clsag(proposal),
        secrets: ProofSecrets::Clsag(ClsagSecrets {
            k_offset,
            commitment_mask,
        }),
    })
}

fn decode_responses(responses: &[[u8; 32]]) -> CryptoResult<Vec<Scalar>> {
    responses
        .iter()
        .enumerate()
        .map(|(i, s)| bytes_to_scalar(s, &format!("responses[{i}]")))
        .collect()
}

pub(super) fn attempt_partial_signature(
    proposal: &ClsagProofProposal,
    secrets: &ClsagSecrets,
    signing_key: &Scalar,
    threshold_inv: &Scalar,
    filter_nonces: &[&[NoncePubkeys]],
    filter: SignerSetFilter,
    vault: &NonceVault,
) -> CryptoResult<PartialSignature> {
    let transcript = proposal.transcript()?;
    let proof_key = *proposal.proof_key();

    let aggregate = BinonceAggregate::compute(
        &proposal.message,
        &proof_key,
        filter_nonces,
        ProofKind::Clsag.required_base_point_count(),
    )?;

    let responses = decode_responses(&proposal.decoy_responses)?;
    let c_next = transcript.challenge(&aggregate.nonces[0], &aggregate.nonces[1]);
    let (c_real, c_0) = transcript.close_ring(proposal.real_index, c_next, &responses)?;
    let (mu_p, mu_c) = transcript.mixing_coefficients();

    let key_share = signing_key + secrets.k_offset * threshold_inv;
    let mask_share = secrets.commitment_mask * threshold_inv;
    let nonces = vault.consume(&NonceRecordKey::new(proposal.message, proof_key, filter))?;
    let s_partial = *nonces.merged(&aggregate.rho) - c_real * (mu_p * key_share + mu_c * mask_share);

    Ok(PartialSignature::Clsag(ClsagPartial {
        message: proposal.message,
        proof_key,
        c_0: c_0.to_bytes(),
        key_image: proposal.key_image,
        d_inv8: proposal.d_inv8,
        responses: proposal.decoy_responses.clone(),
        s_partial: s_partial.to_bytes(),
    }))
}

pub(super) fn finalize(
    proposal: &ClsagProofProposal,
    partials: &[&ClsagPartial],
) -> CryptoResult<CompletedProof> {
    let first = partials
        .first()
        .ok_or_else(|| CryptoError::AssemblyFailed("no partial signatures".into()))?;
    if first.message != proposal.message
        || first.proof_key != *proposal.proof_key()
        || first.key_image != proposal.key_image
        || first.d_inv8 != proposal.d_inv8
        || first.responses != proposal.decoy_responses
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

    let mut s_real = Scalar::ZERO;
    for partial in partials {
        s_real += bytes_to_scalar(&partial.s_partial, "s_partial")
            .map_err(|e| CryptoError::AssemblyFailed(e.to_string()))?;
    }

    let mut s = first.responses.clone();
    s[proposal.real_index] = s_real.to_bytes();
    let proof = ClsagProof {
        s,
        c_0: first.c_0,
        key_image: first.key_image,
        d_inv8: first.d_inv8,
    };
    if !verify_clsag(&proof, &proposal.message, &proposal.ring, &proposal.pseudo_out) {
        return Err(CryptoError::AssemblyFailed(
            "assembled CLSAG does not verify".into(),
        ));
    }

    Ok(CompletedProof::Clsag {
        message: proposal.message,
        ring: proposal.ring.clone(),
        pseudo_out: proposal.pseudo_out,
        proof,
    })
}
