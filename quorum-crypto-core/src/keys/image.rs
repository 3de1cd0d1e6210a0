//! Cooperative key images.
//!
//! Both proof families need a key image of the group spend key before the
//! ceremony starts. Signers of one permutation filter each publish a partial
//! key image of their aggregate signing key on the family's key-image base;
//! the partials sum to the key image without reconstructing the key:
//!
//! ```text
//! pKI_e = (λ_e * s_e) * B
//! KI    = Σ pKI_e + offset * B
//! ```

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};

use super::account::KeyShareProvider;
use super::encoding::{bytes_to_point, point_to_bytes};
use crate::filter::SignerSetFilter;
use crate::types::errors::{CryptoError, CryptoResult};

/// Partial key image of the local signer for `filter` on `base`.
///
/// # Errors
///
/// Propagates `aggregate_signing_key` errors.
pub fn compute_partial_key_image<P: KeyShareProvider + ?Sized>(
    provider: &P,
    filter: SignerSetFilter,
    base: &EdwardsPoint,
) -> CryptoResult<[u8; 32]> {
    let signing_key = provider.aggregate_signing_key(filter)?;
    Ok(point_to_bytes(&(*signing_key * base)))
}

/// Sum partial key images and the public offset term `offset * base`.
///
/// # Errors
///
/// - `InvalidPublicKey` if a partial does not decode
/// - `InternalError` if no partials were supplied
pub fn aggregate_partial_key_images(
    partials: &[[u8; 32]],
    offset: &Scalar,
    base: &EdwardsPoint,
) -> CryptoResult<EdwardsPoint> {
    if partials.is_empty() {
        return Err(CryptoError::InternalError(
            "no partial key images to aggregate".into(),
        ));
    }

    let mut total = offset * base;
    for (i, partial) in partials.iter().enumerate() {
        total += bytes_to_point(partial, &format!("partial_key_image[{i}]"))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SignerRoster;
    use crate::keys::account::deal_accounts;
    use crate::keys::generators::hash_to_point;
    use crate::types::SignerId;
    use rand_core::OsRng;

    #[test]
    fn test_partials_aggregate_to_full_key_image() {
        let signers = (1..=3u8).map(|i| SignerId([i; 32])).collect();
        let roster = SignerRoster::new(signers, 2).unwrap();
        let spend_key = Scalar::random(&mut OsRng);
        let offset = Scalar::random(&mut OsRng);
        let accounts = deal_accounts(&roster, &spend_key, &mut OsRng).unwrap();

        let base = hash_to_point(&[9u8; 32]);
        let filter = SignerSetFilter::from_bits(0b101);
        let partials = [
            compute_partial_key_image(&accounts[0], filter, &base).unwrap(),
            compute_partial_key_image(&accounts[2], filter, &base).unwrap(),
        ];

        let key_image = aggregate_partial_key_images(&partials, &offset, &base).unwrap();
        assert_eq!(key_image, (spend_key + offset) * base);
    }

    #[test]
    fn test_empty_partials_rejected() {
        let base = hash_to_point(&[1u8; 32]);
        assert!(aggregate_partial_key_images(&[], &Scalar::ONE, &base).is_err());
    }
}
