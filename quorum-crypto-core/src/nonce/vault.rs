//! Single-use nonce storage.
//!
//! The vault is the only place a signer's secret binonces live between
//! round 1 (publishing commitments) and round 2 (signing). Records are keyed
//! by `(message, proof key, permutation filter)`; a record is created at most
//! once and destroyed by the one `consume` that signs with it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use curve25519_dalek::edwards::EdwardsPoint;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, trace};

use super::binonce::{NoncePubkeys, SecretNoncePair};
use crate::filter::SignerSetFilter;
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::sanitize::sanitize_hex;

/// Composite key of one nonce record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NonceRecordKey {
    /// Message the nonce may sign.
    pub message: [u8; 32],
    /// Proof key (one-time address or ring signing key) the nonce belongs to.
    pub proof_key: [u8; 32],
    /// Permutation filter the nonce is committed for.
    pub filter: SignerSetFilter,
}

impl NonceRecordKey {
    /// Build a key.
    #[must_use]
    pub fn new(message: [u8; 32], proof_key: [u8; 32], filter: SignerSetFilter) -> Self {
        Self {
            message,
            proof_key,
            filter,
        }
    }

    fn not_found(&self) -> CryptoError {
        CryptoError::NotFound {
            message: sanitize_hex(&self.message),
            proof_key: sanitize_hex(&self.proof_key),
            filter: self.filter,
        }
    }
}

/// Per-signer nonce store, safe to share between concurrent ceremonies.
#[derive(Default)]
pub struct NonceVault {
    records: Mutex<HashMap<NonceRecordKey, SecretNoncePair>>,
}

impl NonceVault {
    /// Empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a record half-written, so
    // a poisoned map is still consistent.
    fn records(&self) -> MutexGuard<'_, HashMap<NonceRecordKey, SecretNoncePair>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the record for `key` if absent and return its commitments on
    /// each of `base_points`.
    ///
    /// Calling again before the record is consumed returns the same
    /// commitments.
    pub fn ensure<R: RngCore + CryptoRng>(
        &self,
        key: &NonceRecordKey,
        base_points: &[EdwardsPoint],
        rng: &mut R,
    ) -> Vec<NoncePubkeys> {
        let mut records = self.records();
        let pair = records.entry(*key).or_insert_with(|| {
            trace!(
                message = %sanitize_hex(&key.message),
                proof_key = %sanitize_hex(&key.proof_key),
                filter = %key.filter,
                "Generated nonce record"
            );
            SecretNoncePair::generate(rng)
        });
        base_points.iter().map(|b| pair.commitments(b)).collect()
    }

    /// Commitments of the stored pair on `base_point`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no live record for `key`.
    pub fn public_commitments_for_base(
        &self,
        key: &NonceRecordKey,
        base_point: &EdwardsPoint,
    ) -> CryptoResult<NoncePubkeys> {
        self.records()
            .get(key)
            .map(|pair| pair.commitments(base_point))
            .ok_or_else(|| key.not_found())
    }

    /// Take the secret pair out of the vault, deleting the record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record was never created or is already consumed.
    pub fn consume(&self, key: &NonceRecordKey) -> CryptoResult<SecretNoncePair> {
        let pair = self.records().remove(key).ok_or_else(|| key.not_found())?;
        debug!(
            message = %sanitize_hex(&key.message),
            proof_key = %sanitize_hex(&key.proof_key),
            filter = %key.filter,
            "Consumed nonce record"
        );
        Ok(pair)
    }

    /// Discard a record without using it. Returns whether one existed.
    pub fn remove(&self, key: &NonceRecordKey) -> bool {
        self.records().remove(key).is_some()
    }

    /// Discard every record for `message`. Returns how many were dropped.
    pub fn remove_message(&self, message: &[u8; 32]) -> usize {
        let mut records = self.records();
        let before = records.len();
        records.retain(|key, _| &key.message != message);
        let removed = before - records.len();
        if removed > 0 {
            debug!(message = %sanitize_hex(message), removed, "Discarded nonce records");
        }
        removed
    }

    /// Whether a live record exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &NonceRecordKey) -> bool {
        self.records().contains_key(key)
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether the vault holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl std::fmt::Debug for NonceVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceVault")
            .field("records", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generators::{generator_g, generator_u};
    use rand_core::OsRng;
    use std::sync::Arc;

    fn key(filter: u16) -> NonceRecordKey {
        NonceRecordKey::new([1; 32], [2; 32], SignerSetFilter::from_bits(filter))
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let vault = NonceVault::new();
        let bases = [generator_g(), generator_u()];
        let first = vault.ensure(&key(0b11), &bases, &mut OsRng);
        let second = vault.ensure(&key(0b11), &bases, &mut OsRng);
        assert_eq!(first, second);
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn test_consume_once() {
        let vault = NonceVault::new();
        vault.ensure(&key(0b11), &[generator_g()], &mut OsRng);

        assert!(vault.consume(&key(0b11)).is_ok());
        assert!(matches!(
            vault.consume(&key(0b11)),
            Err(CryptoError::NotFound { .. })
        ));
        assert!(vault.is_empty());
    }

    #[test]
    fn test_ensure_after_consume_creates_fresh_pair() {
        let vault = NonceVault::new();
        let before = vault.ensure(&key(0b11), &[generator_g()], &mut OsRng);
        drop(vault.consume(&key(0b11)).unwrap());
        let after = vault.ensure(&key(0b11), &[generator_g()], &mut OsRng);
        assert_ne!(before, after);
    }

    #[test]
    fn test_projection_matches_ensure() {
        let vault = NonceVault::new();
        let bases = [generator_g(), generator_u()];
        let commitments = vault.ensure(&key(0b101), &bases, &mut OsRng);
        assert_eq!(
            vault.public_commitments_for_base(&key(0b101), &bases[1]).unwrap(),
            commitments[1]
        );
        assert!(vault
            .public_commitments_for_base(&key(0b110), &bases[0])
            .is_err());
    }

    #[test]
    fn test_keys_are_independent() {
        let vault = NonceVault::new();
        let g = [generator_g()];
        let a = vault.ensure(&key(0b011), &g, &mut OsRng);
        let b = vault.ensure(&key(0b101), &g, &mut OsRng);
        assert_ne!(a, b);
        assert!(vault.remove(&key(0b011)));
        assert!(!vault.contains(&key(0b011)));
        assert!(vault.contains(&key(0b101)));
    }

    #[test]
    fn test_remove_message() {
        let vault = NonceVault::new();
        let g = [generator_g()];
        vault.ensure(&key(0b011), &g, &mut OsRng);
        vault.ensure(&key(0b101), &g, &mut OsRng);
        let other = NonceRecordKey::new([9; 32], [2; 32], SignerSetFilter::from_bits(0b011));
        vault.ensure(&other, &g, &mut OsRng);

        assert_eq!(vault.remove_message(&[1; 32]), 2);
        assert_eq!(vault.len(), 1);
        assert!(vault.contains(&other));
    }

    #[test]
    fn test_concurrent_consume_yields_one_winner() {
        let vault = Arc::new(NonceVault::new());
        vault.ensure(&key(0b11), &[generator_g()], &mut OsRng);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let vault = Arc::clone(&vault);
                std::thread::spawn(move || vault.consume(&key(0b11)).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
