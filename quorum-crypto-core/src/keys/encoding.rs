//! Conversions between wire bytes and curve types.

use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    traits::IsIdentity,
    Scalar,
};

use crate::types::errors::{CryptoError, CryptoResult};

/// Decode a compressed Edwards point.
///
/// # Errors
///
/// `InvalidPublicKey` if the bytes are not a valid point encoding.
pub fn bytes_to_point(bytes: &[u8; 32], field: &str) -> CryptoResult<EdwardsPoint> {
    CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or_else(|| CryptoError::InvalidPublicKey(format!("{field} is not a valid curve point")))
}

/// Decode a point that must be a non-identity member of the prime-order
/// subgroup (key images, proof keys).
///
/// # Errors
///
/// `InvalidPublicKey` on bad encodings, identity or torsion.
pub fn bytes_to_prime_order_point(bytes: &[u8; 32], field: &str) -> CryptoResult<EdwardsPoint> {
    let point = bytes_to_point(bytes, field)?;
    if point.is_identity() {
        return Err(CryptoError::InvalidPublicKey(format!("{field} is the identity")));
    }
    if !point.is_torsion_free() {
        return Err(CryptoError::InvalidPublicKey(format!("{field} has a torsion component")));
    }
    Ok(point)
}

/// Decode a canonically encoded scalar.
///
/// # Errors
///
/// `InvalidSecretKey` if the bytes are not reduced mod l.
pub fn bytes_to_scalar(bytes: &[u8; 32], field: &str) -> CryptoResult<Scalar> {
    Option::from(Scalar::from_canonical_bytes(*bytes))
        .ok_or_else(|| CryptoError::InvalidSecretKey(format!("{field} is not a canonical scalar")))
}

/// Compressed encoding of a point.
#[inline]
#[must_use]
pub fn point_to_bytes(point: &EdwardsPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;

    #[test]
    fn test_bytes_to_scalar_one() {
        let mut one = [0u8; 32];
        one[0] = 1;
        assert_eq!(bytes_to_scalar(&one, "one").unwrap(), Scalar::ONE);
    }

    #[test]
    fn test_non_canonical_scalar_rejected() {
        assert!(bytes_to_scalar(&[0xff; 32], "s").is_err());
    }

    #[test]
    fn test_point_round_trip() {
        let bytes = point_to_bytes(&ED25519_BASEPOINT_POINT);
        assert_eq!(bytes_to_point(&bytes, "G").unwrap(), ED25519_BASEPOINT_POINT);
        assert!(bytes_to_prime_order_point(&bytes, "G").is_ok());
    }

    #[test]
    fn test_identity_rejected_as_key() {
        let mut identity = [0u8; 32];
        identity[0] = 1;
        assert!(bytes_to_point(&identity, "I").is_ok());
        assert!(bytes_to_prime_order_point(&identity, "I").is_err());
    }
}
