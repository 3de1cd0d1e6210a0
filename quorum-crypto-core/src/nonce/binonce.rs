//! MuSig2 binonces.
//!
//! Each signer holds two secret nonces `(a1, a2)` per record and publishes
//! their commitments on every base point the proof family needs. Once all
//! commitments of a permutation filter are known, a merge factor `ρ` bound to
//! the message, the proof key and every commitment collapses the pair:
//!
//! ```text
//! ρ   = Hs("quorum_binonce_merge" || message || proof_key || A1_0 || A2_0 || ...)
//! A_B = Σ_e (A1_e + ρ * A2_e)         (aggregate nonce on base B)
//! a_e = a1_e + ρ * a2_e               (signer e's merged secret nonce)
//! ```

use core::fmt;

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::keys::encoding::{bytes_to_point, point_to_bytes};
use crate::proofs::hash::{ChallengeHasher, BINONCE_MERGE_DOMAIN};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::sanitize::sanitize_hex;
use crate::types::serde_hex;

/// Public commitments `(a1 * B, a2 * B)` of one nonce pair on one base point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoncePubkeys {
    /// `a1 * B`
    #[serde(with = "serde_hex::bytes32")]
    pub first: [u8; 32],
    /// `a2 * B`
    #[serde(with = "serde_hex::bytes32")]
    pub second: [u8; 32],
}

impl NoncePubkeys {
    /// Decode both commitments.
    ///
    /// # Errors
    ///
    /// `InvalidPublicKey` if either is not a curve point.
    pub fn decode(&self) -> CryptoResult<(EdwardsPoint, EdwardsPoint)> {
        Ok((
            bytes_to_point(&self.first, "nonce commitment (first)")?,
            bytes_to_point(&self.second, "nonce commitment (second)")?,
        ))
    }
}

impl fmt::Debug for NoncePubkeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoncePubkeys")
            .field("first", &sanitize_hex(&self.first))
            .field("second", &sanitize_hex(&self.second))
            .finish()
    }
}

/// One signer's secret binonce.
///
/// Only the nonce vault creates these, and only its destructive `consume`
/// hands one out. Not `Clone`; wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretNoncePair {
    first: Scalar,
    second: Scalar,
}

impl SecretNoncePair {
    pub(crate) fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            first: Scalar::random(rng),
            second: Scalar::random(rng),
        }
    }

    /// Commitments of this pair on `base`.
    #[must_use]
    pub fn commitments(&self, base: &EdwardsPoint) -> NoncePubkeys {
        NoncePubkeys {
            first: point_to_bytes(&(self.first * base)),
            second: point_to_bytes(&(self.second * base)),
        }
    }

    /// Merged secret nonce `a1 + ρ * a2`.
    #[must_use]
    pub fn merged(&self, rho: &Scalar) -> Zeroizing<Scalar> {
        Zeroizing::new(self.first + rho * self.second)
    }
}

impl fmt::Debug for SecretNoncePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretNoncePair([REDACTED])")
    }
}

/// Merge factor and aggregate nonces of one permutation filter for one proof.
#[derive(Debug, Clone)]
pub struct BinonceAggregate {
    /// Merge factor `ρ`.
    pub rho: Scalar,
    /// Aggregate nonce per base point, in the family's base-point order.
    pub nonces: Vec<EdwardsPoint>,
}

impl BinonceAggregate {
    /// Merge the commitments of every filter member.
    ///
    /// `members` holds, in roster order, each member's commitments (one
    /// [`NoncePubkeys`] per base point).
    ///
    /// # Errors
    ///
    /// - `InvalidProposal` if no members are given or a member has the wrong
    ///   number of base points
    /// - `InvalidPublicKey` if a commitment does not decode
    pub fn compute(
        message: &[u8; 32],
        proof_key: &[u8; 32],
        members: &[&[NoncePubkeys]],
        base_point_count: usize,
    ) -> CryptoResult<Self> {
        if members.is_empty() {
            return Err(CryptoError::InvalidProposal(
                "no nonce commitments to merge".into(),
            ));
        }
        if let Some(bad) = members.iter().find(|m| m.len() != base_point_count) {
            return Err(CryptoError::InvalidProposal(format!(
                "expected {base_point_count} nonce base points, got {}",
                bad.len()
            )));
        }

        let rho = binonce_merge_factor(message, proof_key, members);

        let mut nonces = Vec::with_capacity(base_point_count);
        for base in 0..base_point_count {
            let mut total = EdwardsPoint::default();
            for member in members {
                let (first, second) = member[base].decode()?;
                total += first + rho * second;
            }
            nonces.push(total);
        }

        Ok(Self { rho, nonces })
    }
}

/// `ρ` for one (message, proof key) over every member's commitments.
#[must_use]
pub fn binonce_merge_factor(
    message: &[u8; 32],
    proof_key: &[u8; 32],
    members: &[&[NoncePubkeys]],
) -> Scalar {
    let mut hasher = ChallengeHasher::new(BINONCE_MERGE_DOMAIN);
    hasher.bytes(message).bytes(proof_key);
    for commitments in members {
        for pubkeys in commitments.iter() {
            hasher.bytes(&pubkeys.first).bytes(&pubkeys.second);
        }
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generators::{generator_g, generator_u};
    use rand_core::OsRng;

    #[test]
    fn test_merged_nonce_matches_aggregate() {
        let pairs: Vec<SecretNoncePair> =
            (0..3).map(|_| SecretNoncePair::generate(&mut OsRng)).collect();
        let bases = [generator_g(), generator_u()];
        let commitments: Vec<Vec<NoncePubkeys>> = pairs
            .iter()
            .map(|p| bases.iter().map(|b| p.commitments(b)).collect())
            .collect();
        let members: Vec<&[NoncePubkeys]> = commitments.iter().map(Vec::as_slice).collect();

        let aggregate = BinonceAggregate::compute(&[1; 32], &[2; 32], &members, 2).unwrap();
        let merged: Scalar = pairs.iter().map(|p| *p.merged(&aggregate.rho)).sum();

        assert_eq!(aggregate.nonces[0], merged * bases[0]);
        assert_eq!(aggregate.nonces[1], merged * bases[1]);
    }

    #[test]
    fn test_merge_factor_binds_context() {
        let pair = SecretNoncePair::generate(&mut OsRng);
        let commitments = [pair.commitments(&generator_g())];
        let members: [&[NoncePubkeys]; 1] = [&commitments];

        let rho = binonce_merge_factor(&[1; 32], &[2; 32], &members);
        assert_ne!(rho, binonce_merge_factor(&[3; 32], &[2; 32], &members));
        assert_ne!(rho, binonce_merge_factor(&[1; 32], &[3; 32], &members));
        assert_eq!(rho, binonce_merge_factor(&[1; 32], &[2; 32], &members));
    }

    #[test]
    fn test_wrong_base_point_count_rejected() {
        let pair = SecretNoncePair::generate(&mut OsRng);
        let commitments = [pair.commitments(&generator_g())];
        let members: [&[NoncePubkeys]; 1] = [&commitments];
        assert!(matches!(
            BinonceAggregate::compute(&[0; 32], &[0; 32], &members, 2),
            Err(CryptoError::InvalidProposal(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = SecretNoncePair::generate(&mut OsRng);
        assert_eq!(format!("{pair:?}"), "SecretNoncePair([REDACTED])");
    }
}
