//! Proof-kind adapters.
//!
//! The ceremony is generic over what it signs. Everything family-specific
//! sits behind three closed enums, dispatched by exhaustive `match`:
//!
//! - [`ProofProposal`]: what the group agreed to prove
//! - [`PartialSignature`]: one signer's share for one permutation filter
//! - [`CompletedProof`]: the assembled, verifiable proof
//!
//! | Kind          | Nonce base points | Shared response |
//! |---------------|-------------------|-----------------|
//! | `Composition` | `U`               | `r_ki`          |
//! | `Clsag`       | `G`, `Hp(K_l)`    | `s_l`           |

use core::fmt;

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::filter::SignerSetFilter;
use crate::nonce::{NoncePubkeys, NonceVault};
use crate::proofs::clsag::{verify_clsag, ClsagProof, RingMember};
use crate::proofs::composition::{verify_composition, CompositionProof};
use crate::types::errors::{CryptoError, CryptoResult};

pub mod clsag;
pub mod composition;

pub use clsag::{propose_clsag, ClsagPartial, ClsagProofProposal, ClsagSecrets};
pub use composition::{
    propose_composition, CompositionPartial, CompositionProofProposal, CompositionSecrets,
};

/// Proof family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    /// Ownership and key-image composition proof
    Composition,
    /// CLSAG ring signature
    Clsag,
}

impl ProofKind {
    /// Number of base points each nonce must be committed on.
    #[must_use]
    pub const fn required_base_point_count(self) -> usize {
        match self {
            ProofKind::Composition => 1,
            ProofKind::Clsag => 2,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProofKind::Composition => "composition",
            ProofKind::Clsag => "clsag",
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ProofKind {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "composition" => Ok(ProofKind::Composition),
            "clsag" => Ok(ProofKind::Clsag),
            other => Err(CryptoError::InvalidProposal(format!(
                "unknown proof kind '{other}'"
            ))),
        }
    }
}

/// A proof the group agreed to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofProposal {
    /// Composition proof
    Composition(CompositionProofProposal),
    /// CLSAG
    Clsag(ClsagProofProposal),
}

impl ProofProposal {
    /// Family tag.
    #[must_use]
    pub fn kind(&self) -> ProofKind {
        match self {
            ProofProposal::Composition(_) => ProofKind::Composition,
            ProofProposal::Clsag(_) => ProofKind::Clsag,
        }
    }

    /// Message to sign.
    #[must_use]
    pub fn message(&self) -> &[u8; 32] {
        match self {
            ProofProposal::Composition(p) => p.message(),
            ProofProposal::Clsag(p) => p.message(),
        }
    }

    /// Key the proof is about; nonce records are keyed by it.
    #[must_use]
    pub fn proof_key(&self) -> &[u8; 32] {
        match self {
            ProofProposal::Composition(p) => p.proof_key(),
            ProofProposal::Clsag(p) => p.proof_key(),
        }
    }

    /// Key image the proof will carry.
    #[must_use]
    pub fn key_image(&self) -> &[u8; 32] {
        match self {
            ProofProposal::Composition(p) => p.key_image(),
            ProofProposal::Clsag(p) => p.key_image(),
        }
    }

    /// Base points nonces are committed on, in a fixed order.
    #[must_use]
    pub fn nonce_base_points(&self) -> Vec<EdwardsPoint> {
        match self {
            ProofProposal::Composition(p) => p.nonce_base_points(),
            ProofProposal::Clsag(p) => p.nonce_base_points(),
        }
    }
}

/// Group-known private context matching a [`ProofProposal`].
#[derive(Clone)]
pub enum ProofSecrets {
    /// `x`, `y`, `z_offset`
    Composition(CompositionSecrets),
    /// `k_offset`, commitment mask
    Clsag(ClsagSecrets),
}

impl fmt::Debug for ProofSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ProofSecrets::Composition(_) => ProofKind::Composition,
            ProofSecrets::Clsag(_) => ProofKind::Clsag,
        };
        write!(f, "ProofSecrets::{kind}([REDACTED])")
    }
}

/// One entry of a ceremony batch.
#[derive(Debug, Clone)]
pub struct ProofRequest {
    /// What to prove
    pub proposal: ProofProposal,
    /// Group-known secrets needed to prove it
    pub secrets: ProofSecrets,
}

/// One signer's contribution to one proof for one permutation filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartialSignature {
    /// Composition proof share
    Composition(CompositionPartial),
    /// CLSAG share
    Clsag(ClsagPartial),
}

impl PartialSignature {
    /// Family tag.
    #[must_use]
    pub fn kind(&self) -> ProofKind {
        match self {
            PartialSignature::Composition(_) => ProofKind::Composition,
            PartialSignature::Clsag(_) => ProofKind::Clsag,
        }
    }

    /// Message the share signs.
    #[must_use]
    pub fn message(&self) -> &[u8; 32] {
        match self {
            PartialSignature::Composition(p) => &p.message,
            PartialSignature::Clsag(p) => &p.message,
        }
    }

    /// Proof key the share belongs to.
    #[must_use]
    pub fn proof_key(&self) -> &[u8; 32] {
        match self {
            PartialSignature::Composition(p) => &p.proof_key,
            PartialSignature::Clsag(p) => &p.proof_key,
        }
    }
}

/// A finished proof with the public context needed to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletedProof {
    /// Composition proof for `proof_key`
    Composition {
        /// Message signed
        #[serde(with = "crate::types::serde_hex::bytes32")]
        message: [u8; 32],
        /// `K`
        #[serde(with = "crate::types::serde_hex::bytes32")]
        proof_key: [u8; 32],
        /// The proof
        proof: CompositionProof,
    },
    /// CLSAG over `ring`
    Clsag {
        /// Message signed
        #[serde(with = "crate::types::serde_hex::bytes32")]
        message: [u8; 32],
        /// Ring members
        ring: Vec<RingMember>,
        /// Pseudo-output commitment
        #[serde(with = "crate::types::serde_hex::bytes32")]
        pseudo_out: [u8; 32],
        /// The signature
        proof: ClsagProof,
    },
}

impl CompletedProof {
    /// Family tag.
    #[must_use]
    pub fn kind(&self) -> ProofKind {
        match self {
            CompletedProof::Composition { .. } => ProofKind::Composition,
            CompletedProof::Clsag { .. } => ProofKind::Clsag,
        }
    }

    /// Message signed.
    #[must_use]
    pub fn message(&self) -> &[u8; 32] {
        match self {
            CompletedProof::Composition { message, .. } | CompletedProof::Clsag { message, .. } => {
                message
            }
        }
    }

    /// Key image carried by the proof.
    #[must_use]
    pub fn key_image(&self) -> &[u8; 32] {
        match self {
            CompletedProof::Composition { proof, .. } => &proof.key_image,
            CompletedProof::Clsag { proof, .. } => &proof.key_image,
        }
    }

    /// Verify exactly as a single-party proof would be.
    #[must_use]
    pub fn verify(&self) -> bool {
        match self {
            CompletedProof::Composition {
                message,
                proof_key,
                proof,
            } => verify_composition(proof, message, proof_key),
            CompletedProof::Clsag {
                message,
                ring,
                pseudo_out,
                proof,
            } => verify_clsag(proof, message, ring, pseudo_out),
        }
    }
}

/// Check a ceremony batch: non-empty, every proposal on `message`, one proof
/// family, no proof key twice. Returns the batch's family.
///
/// A repeated proof key would map two proofs onto one nonce record.
///
/// # Errors
///
/// `InvalidProposal` describing the first violation.
pub fn validate_batch(message: &[u8; 32], batch: &[ProofRequest]) -> CryptoResult<ProofKind> {
    let first = batch
        .first()
        .ok_or_else(|| CryptoError::InvalidProposal("empty proof batch".into()))?;
    let kind = first.proposal.kind();

    for (i, request) in batch.iter().enumerate() {
        let proposal = &request.proposal;
        if proposal.message() != message {
            return Err(CryptoError::InvalidProposal(format!(
                "proof {i} signs a different message"
            )));
        }
        if proposal.kind() != kind {
            return Err(CryptoError::InvalidProposal(format!(
                "proof {i} is a {} proof in a {kind} batch",
                proposal.kind()
            )));
        }
        if batch[..i]
            .iter()
            .any(|earlier| earlier.proposal.proof_key() == proposal.proof_key())
        {
            return Err(CryptoError::InvalidProposal(format!(
                "proof {i} repeats an earlier proof key"
            )));
        }
    }
    Ok(kind)
}

fn threshold_inverse(threshold: u32) -> CryptoResult<Scalar> {
    if threshold == 0 {
        return Err(CryptoError::InvalidThreshold {
            threshold,
            max_signers: 0,
        });
    }
    Ok(Scalar::from(u64::from(threshold)).invert())
}

/// Produce the local signer's partial signature for one proof and filter.
///
/// `signing_key` is the signer's aggregate signing key for `filter` (see
/// [`KeyShareProvider`](crate::keys::KeyShareProvider)); each signer adds
/// its `1/threshold` slice of the group-known offsets on top.
/// `filter_nonces` holds every filter member's commitments in roster order.
///
/// Consumes the vault record `(message, proof key, filter)`. Everything that
/// can fail is checked first, so an `Err` other than `NotFound` leaves the
/// record in place.
///
/// # Errors
///
/// - `InvalidProposal` if `secrets` belong to another family, or the nonces
///   have the wrong shape
/// - `NotFound` if the nonce record was never created or already used
/// - decoding errors for malformed proposal points
pub fn attempt_partial_signature(
    proposal: &ProofProposal,
    secrets: &ProofSecrets,
    signing_key: &Scalar,
    threshold: u32,
    filter_nonces: &[&[NoncePubkeys]],
    filter: SignerSetFilter,
    vault: &NonceVault,
) -> CryptoResult<PartialSignature> {
    let threshold_inv = threshold_inverse(threshold)?;
    match (proposal, secrets) {
        (ProofProposal::Composition(p), ProofSecrets::Composition(s)) => {
            composition::attempt_partial_signature(
                p,
                s,
                signing_key,
                &threshold_inv,
                filter_nonces,
                filter,
                vault,
            )
        }
        (ProofProposal::Clsag(p), ProofSecrets::Clsag(s)) => clsag::attempt_partial_signature(
            p,
            s,
            signing_key,
            &threshold_inv,
            filter_nonces,
            filter,
            vault,
        ),
        (proposal, _) => Err(CryptoError::InvalidProposal(format!(
            "secrets do not match a {} proposal",
            proposal.kind()
        ))),
    }
}

/// Assemble partial signatures into a proof.
///
/// # Errors
///
/// `AssemblyFailed` if the partials are empty, of another family, disagree
/// with each other or the proposal, or sum to a proof that does not verify.
pub fn finalize(
    proposal: &ProofProposal,
    partials: &[PartialSignature],
) -> CryptoResult<CompletedProof> {
    match proposal {
        ProofProposal::Composition(p) => {
            let shares = partials
                .iter()
                .map(|partial| match partial {
                    PartialSignature::Composition(share) => Ok(share),
                    PartialSignature::Clsag(_) => Err(kind_mismatch(ProofKind::Composition)),
                })
                .collect::<CryptoResult<Vec<_>>>()?;
            composition::finalize(p, &shares)
        }
        ProofProposal::Clsag(p) => {
            let shares = partials
                .iter()
                .map(|partial| match partial {
                    PartialSignature::Clsag(share) => Ok(share),
                    PartialSignature::Composition(_) => Err(kind_mismatch(ProofKind::Clsag)),
                })
                .collect::<CryptoResult<Vec<_>>>()?;
            clsag::finalize(p, &shares)
        }
    }
}

fn kind_mismatch(expected: ProofKind) -> CryptoError {
    CryptoError::AssemblyFailed(format!("partial signature is not a {expected} share"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyShareProvider;
    use crate::nonce::NonceRecordKey;
    use crate::test_utils::{clsag_request, composition_request, test_group, TestGroup};
    use rand_core::OsRng;

    fn sign_filter(
        group: &TestGroup,
        request: &ProofRequest,
        filter: SignerSetFilter,
    ) -> CryptoResult<Vec<PartialSignature>> {
        let proposal = &request.proposal;
        let bases = proposal.nonce_base_points();
        let key = NonceRecordKey::new(*proposal.message(), *proposal.proof_key(), filter);
        let commitments: Vec<Vec<NoncePubkeys>> = filter
            .indices()
            .map(|i| group.vaults[i].ensure(&key, &bases, &mut OsRng))
            .collect();
        let members: Vec<&[NoncePubkeys]> = commitments.iter().map(Vec::as_slice).collect();

        filter
            .indices()
            .map(|i| {
                let signing_key = group.accounts[i].aggregate_signing_key(filter)?;
                attempt_partial_signature(
                    proposal,
                    &request.secrets,
                    &signing_key,
                    group.roster.threshold(),
                    &members,
                    filter,
                    &group.vaults[i],
                )
            })
            .collect()
    }

    #[test]
    fn test_composition_every_filter_verifies() {
        let group = test_group(3, 2);
        for filter in group.roster.permutation_filters(group.roster.full_filter()).unwrap() {
            let request = composition_request(&group, [7; 32]);
            let partials = sign_filter(&group, &request, filter).unwrap();
            let proof = finalize(&request.proposal, &partials).unwrap();
            assert!(proof.verify(), "filter {filter}");
            assert_eq!(proof.kind(), ProofKind::Composition);
        }
    }

    #[test]
    fn test_clsag_every_filter_verifies() {
        let group = test_group(4, 3);
        for filter in group.roster.permutation_filters(group.roster.full_filter()).unwrap() {
            let request = clsag_request(&group, [9; 32]);
            let partials = sign_filter(&group, &request, filter).unwrap();
            let proof = finalize(&request.proposal, &partials).unwrap();
            assert!(proof.verify(), "filter {filter}");
            assert_eq!(proof.key_image(), request.proposal.key_image());
        }
    }

    #[test]
    fn test_missing_share_fails_assembly() {
        let group = test_group(3, 2);
        let filter = SignerSetFilter::from_bits(0b011);
        let request = composition_request(&group, [1; 32]);
        let partials = sign_filter(&group, &request, filter).unwrap();
        assert!(matches!(
            finalize(&request.proposal, &partials[..1]),
            Err(CryptoError::AssemblyFailed(_))
        ));
    }

    #[test]
    fn test_partials_from_different_filters_fail() {
        let group = test_group(3, 2);
        let request = composition_request(&group, [1; 32]);
        let a = sign_filter(&group, &request, SignerSetFilter::from_bits(0b011)).unwrap();
        let b = sign_filter(&group, &request, SignerSetFilter::from_bits(0b101)).unwrap();
        let mixed = vec![a[0].clone(), b[1].clone()];
        assert!(finalize(&request.proposal, &mixed).is_err());
    }

    #[test]
    fn test_partials_for_other_message_fail() {
        let group = test_group(2, 2);
        let filter = SignerSetFilter::from_bits(0b11);
        let request = composition_request(&group, [1; 32]);
        let other = composition_request(&group, [2; 32]);
        let partials = sign_filter(&group, &other, filter).unwrap();
        assert!(finalize(&request.proposal, &partials).is_err());
    }

    #[test]
    fn test_second_attempt_hits_consumed_nonce() {
        let group = test_group(2, 2);
        let filter = SignerSetFilter::from_bits(0b11);
        let request = composition_request(&group, [4; 32]);
        let bases = request.proposal.nonce_base_points();
        let key = NonceRecordKey::new(*request.proposal.message(), *request.proposal.proof_key(), filter);
        let commitments: Vec<Vec<NoncePubkeys>> = (0..2)
            .map(|i| group.vaults[i].ensure(&key, &bases, &mut OsRng))
            .collect();
        let members: Vec<&[NoncePubkeys]> = commitments.iter().map(Vec::as_slice).collect();
        let signing_key = group.accounts[0].aggregate_signing_key(filter).unwrap();

        let attempt = || {
            attempt_partial_signature(
                &request.proposal,
                &request.secrets,
                &signing_key,
                2,
                &members,
                filter,
                &group.vaults[0],
            )
        };
        assert!(attempt().is_ok());
        assert!(matches!(attempt(), Err(CryptoError::NotFound { .. })));
    }

    #[test]
    fn test_mismatched_secrets_rejected() {
        let group = test_group(2, 2);
        let filter = SignerSetFilter::from_bits(0b11);
        let composition = composition_request(&group, [1; 32]);
        let clsag = clsag_request(&group, [1; 32]);
        let result = attempt_partial_signature(
            &composition.proposal,
            &clsag.secrets,
            &Scalar::ONE,
            2,
            &[],
            filter,
            &group.vaults[0],
        );
        assert!(matches!(result, Err(CryptoError::InvalidProposal(_))));
    }

    #[test]
    fn test_base_point_counts() {
        let group = test_group(2, 2);
        let composition = composition_request(&group, [1; 32]);
        let clsag = clsag_request(&group, [1; 32]);
        assert_eq!(
            composition.proposal.nonce_base_points().len(),
            ProofKind::Composition.required_base_point_count()
        );
        assert_eq!(
            clsag.proposal.nonce_base_points().len(),
            ProofKind::Clsag.required_base_point_count()
        );
    }

    #[test]
    fn test_validate_batch() {
        let group = test_group(2, 2);
        let a = composition_request(&group, [1; 32]);
        let b = composition_request(&group, [1; 32]);
        let other_message = composition_request(&group, [2; 32]);
        let clsag = clsag_request(&group, [1; 32]);

        assert_eq!(
            validate_batch(&[1; 32], &[a.clone(), b]).unwrap(),
            ProofKind::Composition
        );
        assert!(validate_batch(&[1; 32], &[]).is_err());
        assert!(validate_batch(&[1; 32], &[a.clone(), other_message]).is_err());
        assert!(validate_batch(&[1; 32], &[a.clone(), clsag]).is_err());
        assert!(validate_batch(&[1; 32], &[a.clone(), a]).is_err());
    }

    #[test]
    fn test_proof_kind_parse() {
        assert_eq!("CLSAG".parse::<ProofKind>().unwrap(), ProofKind::Clsag);
        assert_eq!(" composition ".parse::<ProofKind>().unwrap(), ProofKind::Composition);
        assert!("schnorr".parse::<ProofKind>().is_err());
    }
}
