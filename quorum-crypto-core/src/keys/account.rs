//! Account key-share provider.
//!
//! The ceremony never sees a full spend key. It asks a [`KeyShareProvider`]
//! for the local signer's *aggregate signing key* for one permutation filter:
//! the signer's Shamir share weighted by its Lagrange coefficient over that
//! filter. Adapters add the signer's `1/T` slice of any group-known offset on
//! top.

use core::fmt;

use curve25519_dalek::{edwards::EdwardsPoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::generators::{generator_g, generator_u};
use super::shares::{deal_key_shares, lagrange_coefficient};
use crate::filter::{SignerRoster, SignerSetFilter};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::SignerId;

/// Source of the local signer's secret key material.
pub trait KeyShareProvider {
    /// The account's signer roster.
    fn roster(&self) -> &SignerRoster;

    /// Identity of the local signer.
    fn local_signer(&self) -> &SignerId;

    /// Local signer's share of the group spend key, weighted for `filter`.
    ///
    /// Summing the results of every signer in `filter` yields the group
    /// spend key.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` if `filter` is not a valid permutation filter
    /// containing the local signer.
    fn aggregate_signing_key(&self, filter: SignerSetFilter) -> CryptoResult<Zeroizing<Scalar>>;
}

/// One signer's view of a threshold account.
pub struct MultisigAccount {
    roster: SignerRoster,
    local_signer: SignerId,
    local_index: usize,
    spend_share: Zeroizing<Scalar>,
    group_spend_key_g: EdwardsPoint,
    group_spend_key_u: EdwardsPoint,
}

impl MultisigAccount {
    /// Wrap an already distributed key share.
    ///
    /// # Errors
    ///
    /// `InvalidSigner` if `local_signer` is not in the roster.
    pub fn new(
        roster: SignerRoster,
        local_signer: SignerId,
        spend_share: Zeroizing<Scalar>,
        group_spend_key_g: EdwardsPoint,
        group_spend_key_u: EdwardsPoint,
    ) -> CryptoResult<Self> {
        let local_index = roster
            .index_of(&local_signer)
            .ok_or_else(|| CryptoError::InvalidSigner {
                signer: local_signer.short(),
                reason: "local signer is not in the roster".into(),
            })?;

        Ok(Self {
            roster,
            local_signer,
            local_index,
            spend_share,
            group_spend_key_g,
            group_spend_key_u,
        })
    }

    /// Roster position of the local signer.
    #[must_use]
    pub fn local_index(&self) -> usize {
        self.local_index
    }

    /// Group spend key on G, `k_s * G`.
    #[must_use]
    pub fn group_spend_key_g(&self) -> EdwardsPoint {
        self.group_spend_key_g
    }

    /// Group spend key on U, `k_s * U`.
    #[must_use]
    pub fn group_spend_key_u(&self) -> EdwardsPoint {
        self.group_spend_key_u
    }
}

impl KeyShareProvider for MultisigAccount {
    fn roster(&self) -> &SignerRoster {
        &self.roster
    }

    fn local_signer(&self) -> &SignerId {
        &self.local_signer
    }

    fn aggregate_signing_key(&self, filter: SignerSetFilter) -> CryptoResult<Zeroizing<Scalar>> {
        self.roster.validate_permutation_filter(filter)?;
        let lambda = lagrange_coefficient(self.local_index, filter)?;
        Ok(Zeroizing::new(lambda * *self.spend_share))
    }
}

impl fmt::Debug for MultisigAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultisigAccount")
            .field("local_signer", &self.local_signer)
            .field("local_index", &self.local_index)
            .field("threshold", &self.roster.threshold())
            .field("num_signers", &self.roster.num_signers())
            .finish_non_exhaustive()
    }
}

/// Trusted-dealer account setup: splits `spend_key` among the roster and
/// returns one [`MultisigAccount`] per signer, in roster order.
///
/// # Errors
///
/// Propagates dealer parameter errors.
pub fn deal_accounts<R: RngCore + CryptoRng>(
    roster: &SignerRoster,
    spend_key: &Scalar,
    rng: &mut R,
) -> CryptoResult<Vec<MultisigAccount>> {
    let shares = deal_key_shares(spend_key, roster.threshold(), roster.num_signers(), rng)?;
    let key_g = spend_key * generator_g();
    let key_u = spend_key * generator_u();

    roster
        .signers()
        .iter()
        .zip(shares)
        .map(|(signer, share)| MultisigAccount::new(roster.clone(), *signer, share, key_g, key_u))
        .collect()
}
