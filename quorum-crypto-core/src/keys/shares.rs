//! Shamir key shares and Lagrange coefficients.
//!
//! The group spend key `k_s` is split with a degree `T - 1` polynomial
//! `f(x) = k_s + a_1 x + ... + a_{T-1} x^{T-1}`; the signer at roster
//! position `i` holds `f(i + 1)`. Any `T` signers named by a permutation
//! filter `F` reconstruct the key linearly:
//!
//! ```text
//! k_s = Σ_{i ∈ F} λ_i(F) * f(i + 1)
//! λ_i(F) = Π_{j ∈ F, j ≠ i} x_j / (x_j - x_i),   x_i = i + 1
//! ```
//!
//! Because `λ_i` depends on the whole filter, every filter gets its own
//! per-signer "aggregate signing key" `λ_i(F) * f(x_i)`, and the key never
//! has to exist in one place.

use curve25519_dalek::Scalar;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::filter::{SignerSetFilter, MAX_SIGNERS};
use crate::types::errors::{CryptoError, CryptoResult};

/// Share evaluation point of roster position `index` (`index + 1`).
#[inline]
fn share_point(index: usize) -> Scalar {
    Scalar::from(index as u64 + 1)
}

/// Split `secret` into `num_signers` Shamir shares, any `threshold` of which
/// reconstruct it. Trusted-dealer setup, used for simulation and tests.
///
/// # Errors
///
/// `InvalidThreshold` unless `1 <= threshold <= num_signers <= 16`.
pub fn deal_key_shares<R: RngCore + CryptoRng>(
    secret: &Scalar,
    threshold: u32,
    num_signers: u32,
    rng: &mut R,
) -> CryptoResult<Vec<Zeroizing<Scalar>>> {
    if threshold == 0 || threshold > num_signers || num_signers as usize > MAX_SIGNERS {
        return Err(CryptoError::InvalidThreshold {
            threshold,
            max_signers: num_signers,
        });
    }

    let mut coefficients: Vec<Zeroizing<Scalar>> = Vec::with_capacity(threshold as usize);
    coefficients.push(Zeroizing::new(*secret));
    for _ in 1..threshold {
        coefficients.push(Zeroizing::new(Scalar::random(rng)));
    }

    let shares = (0..num_signers as usize)
        .map(|index| {
            // Horner evaluation of f(index + 1)
            let x = share_point(index);
            let value = coefficients
                .iter()
                .rev()
                .fold(Scalar::ZERO, |acc, coefficient| acc * x + **coefficient);
            Zeroizing::new(value)
        })
        .collect();

    Ok(shares)
}

/// Lagrange coefficient at zero for roster position `index` over the
/// signers selected by `filter`.
///
/// # Errors
///
/// `InvalidFilter` if `index` is not selected by `filter`.
pub fn lagrange_coefficient(index: usize, filter: SignerSetFilter) -> CryptoResult<Scalar> {
    if !filter.contains_index(index) {
        return Err(CryptoError::InvalidFilter {
            filter,
            reason: format!("signer index {index} is not part of the filter"),
        });
    }

    let x_i = share_point(index);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for other in filter.indices().filter(|&j| j != index) {
        let x_j = share_point(other);
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    Ok(numerator * denominator.invert())
}
