//! CLSAG ring signatures.
//!
//! Linkable ring signature over a ring of `(K_i, C_i)` pairs, signed with
//! the secret key of one member plus the opening `z` of `C_l - C'`, where
//! `C'` is the pseudo-output commitment.
//!
//! ## Equations
//!
//! ```text
//! KI  = k * Hp(K_l)            D = z * Hp(K_l)       (stored as D/8)
//! μ_P = Hs(CLSAG_agg_0 || K_* || C_* || KI || D/8 || C')
//! μ_C = Hs(CLSAG_agg_1 || K_* || C_* || KI || D/8 || C')
//!
//! L_i     = s_i*G     + c_i * (μ_P*K_i + μ_C*(C_i - C'))
//! R_i     = s_i*Hp(K_i) + c_i * (μ_P*KI + μ_C*D)
//! c_{i+1} = Hs(CLSAG_round || K_* || C_* || C' || m || KI || D/8 || L_i || R_i)
//! ```
//!
//! The proof stores `c_0`, the challenge entering ring index 0. A verifier
//! walks `i = 0..n` and accepts if the walk returns to `c_0`.

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::hash::{ChallengeHasher, CLSAG_AGG_0, CLSAG_AGG_1, CLSAG_ROUND_DOMAIN};
use crate::keys::encoding::{bytes_to_point, bytes_to_prime_order_point, bytes_to_scalar, point_to_bytes};
use crate::keys::generators::{generator_g, hash_to_point};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::serde_hex;

/// Smallest ring accepted.
pub const MIN_RING_SIZE: usize = 2;

/// One ring member: an output key and its amount commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingMember {
    /// Output public key `K_i`
    #[serde(with = "serde_hex::bytes32")]
    pub key: [u8; 32],
    /// Amount commitment `C_i`
    #[serde(with = "serde_hex::bytes32")]
    pub commitment: [u8; 32],
}

/// A finished CLSAG signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClsagProof {
    /// Response per ring member
    #[serde(with = "serde_hex::bytes32_vec")]
    pub s: Vec<[u8; 32]>,
    /// Challenge entering ring index 0
    #[serde(with = "serde_hex::bytes32")]
    pub c_0: [u8; 32],
    /// `KI = k * Hp(K_l)`
    #[serde(with = "serde_hex::bytes32")]
    pub key_image: [u8; 32],
    /// `D / 8`
    #[serde(with = "serde_hex::bytes32")]
    pub d_inv8: [u8; 32],
}

fn inv_eight() -> Scalar {
    Scalar::from(8u64).invert()
}

/// Mixing coefficients `(μ_P, μ_C)`.
#[must_use]
pub fn clsag_mixing_coefficients(
    ring_keys: &[EdwardsPoint],
    ring_commitments: &[EdwardsPoint],
    key_image: &EdwardsPoint,
    d_inv8: &EdwardsPoint,
    pseudo_out: &EdwardsPoint,
) -> (Scalar, Scalar) {
    let mix = |domain: &[u8]| {
        let mut hasher = ChallengeHasher::new(domain);
        hasher
            .points(ring_keys)
            .points(ring_commitments)
            .point(key_image)
            .point(d_inv8)
            .point(pseudo_out);
        hasher.finalize()
    };
    (mix(CLSAG_AGG_0), mix(CLSAG_AGG_1))
}

/// Round challenge `c_{i+1}` from `L_i` and `R_i`.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn clsag_round_challenge(
    ring_keys: &[EdwardsPoint],
    ring_commitments: &[EdwardsPoint],
    pseudo_out: &EdwardsPoint,
    message: &[u8; 32],
    key_image: &EdwardsPoint,
    d_inv8: &EdwardsPoint,
    l_point: &EdwardsPoint,
    r_point: &EdwardsPoint,
) -> Scalar {
    let mut hasher = ChallengeHasher::new(CLSAG_ROUND_DOMAIN);
    hasher
        .points(ring_keys)
        .points(ring_commitments)
        .point(pseudo_out)
        .bytes(message)
        .point(key_image)
        .point(d_inv8)
        .point(l_point)
        .point(r_point);
    hasher.finalize()
}

/// Decoded ring plus everything the round function needs.
///
/// Built once per proof; both single-party and threshold signing close the
/// ring through it.
#[derive(Debug, Clone)]
pub struct ClsagTranscript {
    message: [u8; 32],
    keys: Vec<EdwardsPoint>,
    commitments: Vec<EdwardsPoint>,
    hashed_keys: Vec<EdwardsPoint>,
    pseudo_out: EdwardsPoint,
    key_image: EdwardsPoint,
    d_inv8: EdwardsPoint,
    d: EdwardsPoint,
    mu_p: Scalar,
    mu_c: Scalar,
}

impl ClsagTranscript {
    /// Decode the ring and derive the mixing coefficients.
    ///
    /// # Errors
    ///
    /// - `RingSizeTooSmall` below [`MIN_RING_SIZE`]
    /// - `InvalidPublicKey` on undecodable points, or a key image outside the
    ///   prime-order subgroup
    pub fn new(
        message: &[u8; 32],
        ring: &[RingMember],
        pseudo_out: &[u8; 32],
        key_image: &[u8; 32],
        d_inv8: &[u8; 32],
    ) -> CryptoResult<Self> {
        if ring.len() < MIN_RING_SIZE {
            return Err(CryptoError::RingSizeTooSmall {
                actual: ring.len(),
                minimum: MIN_RING_SIZE,
            });
        }

        let mut keys = Vec::with_capacity(ring.len());
        let mut commitments = Vec::with_capacity(ring.len());
        let mut hashed_keys = Vec::with_capacity(ring.len());
        for (i, member) in ring.iter().enumerate() {
            keys.push(bytes_to_point(&member.key, &format!("ring[{i}].key"))?);
            commitments.push(bytes_to_point(&member.commitment, &format!("ring[{i}].commitment"))?);
            hashed_keys.push(hash_to_point(&member.key));
        }

        let pseudo_out = bytes_to_point(pseudo_out, "pseudo_out")?;
        let key_image = bytes_to_prime_order_point(key_image, "key_image")?;
        let d_inv8 = bytes_to_point(d_inv8, "d_inv8")?;
        let d = d_inv8.mul_by_cofactor();
        let (mu_p, mu_c) =
            clsag_mixing_coefficients(&keys, &commitments, &key_image, &d_inv8, &pseudo_out);

        Ok(Self {
            message: *message,
            keys,
            commitments,
            hashed_keys,
            pseudo_out,
            key_image,
            d_inv8,
            d,
            mu_p,
            mu_c,
        })
    }

    /// Ring size.
    #[must_use]
    pub fn ring_size(&self) -> usize {
        self.keys.len()
    }

    /// `(μ_P, μ_C)`.
    #[must_use]
    pub fn mixing_coefficients(&self) -> (Scalar, Scalar) {
        (self.mu_p, self.mu_c)
    }

    /// `Hp(K_i)`.
    ///
    /// # Errors
    ///
    /// `SignerIndexOutOfBounds` if `index` is outside the ring.
    pub fn hashed_key(&self, index: usize) -> CryptoResult<EdwardsPoint> {
        self.hashed_keys
            .get(index)
            .copied()
            .ok_or(CryptoError::SignerIndexOutOfBounds {
                index,
                ring_size: self.ring_size(),
            })
    }

    /// Challenge following an `(L, R)` pair.
    #[must_use]
    pub fn challenge(&self, l_point: &EdwardsPoint, r_point: &EdwardsPoint) -> Scalar {
        clsag_round_challenge(
            &self.keys,
            &self.commitments,
            &self.pseudo_out,
            &self.message,
            &self.key_image,
            &self.d_inv8,
            l_point,
            r_point,
        )
    }

    fn round(&self, index: usize, response: &Scalar, challenge: &Scalar) -> Scalar {
        let w = self.mu_p * self.keys[index] + self.mu_c * (self.commitments[index] - self.pseudo_out);
        let w_tilde = self.mu_p * self.key_image + self.mu_c * self.d;
        let l_point = response * generator_g() + challenge * w;
        let r_point = response * self.hashed_keys[index] + challenge * w_tilde;
        self.challenge(&l_point, &r_point)
    }

    /// Walk the ring from `real + 1` back to `real`, starting with `c_next`
    /// (the challenge produced by the real member's nonces), using
    /// `responses` for every other member.
    ///
    /// Returns `(c_real, c_0)`: the challenge entering the real index and the
    /// challenge entering index 0.
    ///
    /// # Errors
    ///
    /// - `SignerIndexOutOfBounds` if `real` is outside the ring
    /// - `InvalidProposal` if `responses` is not ring-sized
    pub fn close_ring(
        &self,
        real: usize,
        c_next: Scalar,
        responses: &[Scalar],
    ) -> CryptoResult<(Scalar, Scalar)> {
        let n = self.ring_size();
        if real >= n {
            return Err(CryptoError::SignerIndexOutOfBounds {
                index: real,
                ring_size: n,
            });
        }
        if responses.len() != n {
            return Err(CryptoError::InvalidProposal(format!(
                "expected {n} ring responses, got {}",
                responses.len()
            )));
        }

        let mut index = (real + 1) % n;
        let mut challenge = c_next;
        let mut c_0 = challenge;
        while index != real {
            if index == 0 {
                c_0 = challenge;
            }
            challenge = self.round(index, &responses[index], &challenge);
            index = (index + 1) % n;
        }
        if real == 0 {
            c_0 = challenge;
        }
        Ok((challenge, c_0))
    }

    /// Whether `responses` close the ring at `c_0`.
    #[must_use]
    pub fn verify(&self, responses: &[Scalar], c_0: &Scalar) -> bool {
        if responses.len() != self.ring_size() {
            return false;
        }
        let mut challenge = *c_0;
        for (index, response) in responses.iter().enumerate() {
            challenge = self.round(index, response, &challenge);
        }
        challenge == *c_0
    }
}

/// Single-party CLSAG signature.
///
/// # Errors
///
/// - `RingSizeTooSmall` / `SignerIndexOutOfBounds` for a bad ring
/// - `InvalidSecretKey` if `signing_key` or `commitment_mask` does not match
///   the real member
#[allow(clippy::too_many_arguments)]
pub fn prove_clsag<R: RngCore + CryptoRng>(
    message: &[u8; 32],
    ring: &[RingMember],
    pseudo_out: &[u8; 32],
    real_index: usize,
    signing_key: &Scalar,
    commitment_mask: &Scalar,
    rng: &mut R,
) -> CryptoResult<ClsagProof> {
    let real = ring.get(real_index).ok_or(CryptoError::SignerIndexOutOfBounds {
        index: real_index,
        ring_size: ring.len(),
    })?;
    let real_key = bytes_to_point(&real.key, "ring[real].key")?;
    let real_commitment = bytes_to_point(&real.commitment, "ring[real].commitment")?;
    let pseudo_point = bytes_to_point(pseudo_out, "pseudo_out")?;
    if signing_key * generator_g() != real_key {
        return Err(CryptoError::InvalidSecretKey(
            "signing key does not match the real ring member".into(),
        ));
    }
    if commitment_mask * generator_g() != real_commitment - pseudo_point {
        return Err(CryptoError::InvalidSecretKey(
            "commitment mask does not open C_l - C'".into(),
        ));
    }

    let hashed = hash_to_point(&real.key);
    let key_image = point_to_bytes(&(signing_key * hashed));
    let d_inv8 = point_to_bytes(&(inv_eight() * (commitment_mask * hashed)));
    let transcript = ClsagTranscript::new(message, ring, pseudo_out, &key_image, &d_inv8)?;

    let alpha = Scalar::random(rng);
    let mut responses: Vec<Scalar> = (0..ring.len()).map(|_| Scalar::random(rng)).collect();
    let c_next = transcript.challenge(&(alpha * generator_g()), &(alpha * hashed));
    let (c_real, c_0) = transcript.close_ring(real_index, c_next, &responses)?;

    let (mu_p, mu_c) = transcript.mixing_coefficients();
    responses[real_index] = alpha - c_real * (mu_p * signing_key + mu_c * commitment_mask);

    Ok(ClsagProof {
        s: responses.iter().map(Scalar::to_bytes).collect(),
        c_0: c_0.to_bytes(),
        key_image,
        d_inv8,
    })
}

/// Verify a CLSAG signature.
#[must_use]
pub fn verify_clsag(
    proof: &ClsagProof,
    message: &[u8; 32],
    ring: &[RingMember],
    pseudo_out: &[u8; 32],
) -> bool {
    verify_clsag_inner(proof, message, ring, pseudo_out).unwrap_or(false)
}

fn verify_clsag_inner(
    proof: &ClsagProof,
    message: &[u8; 32],
    ring: &[RingMember],
    pseudo_out: &[u8; 32],
) -> CryptoResult<bool> {
    if proof.s.len() != ring.len() {
        return Ok(false);
    }
    let transcript = ClsagTranscript::new(message, ring, pseudo_out, &proof.key_image, &proof.d_inv8)?;
    let c_0 = bytes_to_scalar(&proof.c_0, "c_0")?;
    let responses = proof
        .s
        .iter()
        .enumerate()
        .map(|(i, s)| bytes_to_scalar(s, &format!("s[{i}]")))
        .collect::<CryptoResult<Vec<_>>>()?;
    Ok(transcript.verify(&responses, &c_0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    struct TestRing {
        ring: Vec<RingMember>,
        pseudo_out: [u8; 32],
        key: Scalar,
        mask: Scalar,
    }

    fn test_ring(size: usize, real: usize) -> TestRing {
        let key = Scalar::random(&mut OsRng);
        let mask = Scalar::random(&mut OsRng);
        let pseudo = Scalar::random(&mut OsRng) * generator_g();
        let ring = (0..size)
            .map(|i| {
                if i == real {
                    RingMember {
                        key: point_to_bytes(&(key * generator_g())),
                        commitment: point_to_bytes(&(pseudo + mask * generator_g())),
                    }
                } else {
                    RingMember {
                        key: point_to_bytes(&(Scalar::random(&mut OsRng) * generator_g())),
                        commitment: point_to_bytes(&(Scalar::random(&mut OsRng) * generator_g())),
                    }
                }
            })
            .collect();
        TestRing {
            ring,
            pseudo_out: point_to_bytes(&pseudo),
            key,
            mask,
        }
    }

    #[test]
    fn test_sign_and_verify_every_real_index() {
        for real in 0..4 {
            let t = test_ring(4, real);
            let message = [real as u8; 32];
            let proof =
                prove_clsag(&message, &t.ring, &t.pseudo_out, real, &t.key, &t.mask, &mut OsRng)
                    .unwrap();
            assert!(verify_clsag(&proof, &message, &t.ring, &t.pseudo_out), "real {real}");
        }
    }

    #[test]
    fn test_wrong_message_fails() {
        let t = test_ring(3, 1);
        let proof =
            prove_clsag(&[1; 32], &t.ring, &t.pseudo_out, 1, &t.key, &t.mask, &mut OsRng).unwrap();
        assert!(!verify_clsag(&proof, &[2; 32], &t.ring, &t.pseudo_out));
    }

    #[test]
    fn test_tampered_response_fails() {
        let t = test_ring(3, 2);
        let mut proof =
            prove_clsag(&[1; 32], &t.ring, &t.pseudo_out, 2, &t.key, &t.mask, &mut OsRng).unwrap();
        proof.s[0] = Scalar::ONE.to_bytes();
        assert!(!verify_clsag(&proof, &[1; 32], &t.ring, &t.pseudo_out));
    }

    #[test]
    fn test_key_image_is_linkable() {
        let t = test_ring(3, 0);
        let a = prove_clsag(&[1; 32], &t.ring, &t.pseudo_out, 0, &t.key, &t.mask, &mut OsRng).unwrap();
        let b = prove_clsag(&[2; 32], &t.ring, &t.pseudo_out, 0, &t.key, &t.mask, &mut OsRng).unwrap();
        assert_eq!(a.key_image, b.key_image);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let t = test_ring(3, 0);
        let result = prove_clsag(&[1; 32], &t.ring, &t.pseudo_out, 0, &t.mask, &t.mask, &mut OsRng);
        assert!(matches!(result, Err(CryptoError::InvalidSecretKey(_))));
    }

    #[test]
    fn test_ring_too_small() {
        let t = test_ring(1, 0);
        let result = prove_clsag(&[1; 32], &t.ring, &t.pseudo_out, 0, &t.key, &t.mask, &mut OsRng);
        assert!(matches!(result, Err(CryptoError::RingSizeTooSmall { .. })));
    }

    #[test]
    fn test_real_index_out_of_bounds() {
        let t = test_ring(3, 0);
        let result = prove_clsag(&[1; 32], &t.ring, &t.pseudo_out, 3, &t.key, &t.mask, &mut OsRng);
        assert!(matches!(result, Err(CryptoError::SignerIndexOutOfBounds { .. })));
    }
}
