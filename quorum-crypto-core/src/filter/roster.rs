//! The fixed, ordered signer roster of a multisig account.

use serde::{Deserialize, Serialize};

use super::permutations::{n_choose_k, PermutationFilters};
use super::{SignerSetFilter, MAX_SIGNERS};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::SignerId;

/// Ordered list of the `N` declared signers plus the threshold `T`.
///
/// Roster position `i` owns bit `i` of every [`SignerSetFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRoster {
    signers: Vec<SignerId>,
    threshold: u32,
}

impl SignerRoster {
    /// Build a roster.
    ///
    /// # Errors
    ///
    /// - `InvalidThreshold` unless `1 <= threshold <= signers.len() <= 16`
    /// - `InvalidSigner` if an identity is declared twice
    pub fn new(signers: Vec<SignerId>, threshold: u32) -> CryptoResult<Self> {
        let count = u32::try_from(signers.len()).unwrap_or(u32::MAX);
        if threshold == 0 || threshold > count || signers.len() > MAX_SIGNERS {
            return Err(CryptoError::InvalidThreshold {
                threshold,
                max_signers: count,
            });
        }

        for (i, signer) in signers.iter().enumerate() {
            if signers[..i].contains(signer) {
                return Err(CryptoError::InvalidSigner {
                    signer: signer.short(),
                    reason: "declared twice".into(),
                });
            }
        }

        Ok(Self { signers, threshold })
    }

    /// Threshold `T`.
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Number of declared signers `N`.
    #[must_use]
    pub fn num_signers(&self) -> u32 {
        self.signers.len() as u32
    }

    /// Declared signers in roster order.
    #[must_use]
    pub fn signers(&self) -> &[SignerId] {
        &self.signers
    }

    /// Roster position of `signer`.
    #[must_use]
    pub fn index_of(&self, signer: &SignerId) -> Option<usize> {
        self.signers.iter().position(|s| s == signer)
    }

    /// Signer at roster position `index`.
    #[must_use]
    pub fn signer_at(&self, index: usize) -> Option<&SignerId> {
        self.signers.get(index)
    }

    /// Filter selecting every declared signer.
    #[must_use]
    pub fn full_filter(&self) -> SignerSetFilter {
        (0..self.signers.len()).fold(SignerSetFilter::empty(), SignerSetFilter::with_index)
    }

    /// Whether `signer` is declared and selected by `filter`.
    #[must_use]
    pub fn is_member(&self, signer: &SignerId, filter: SignerSetFilter) -> bool {
        self.index_of(signer)
            .is_some_and(|index| filter.contains_index(index))
    }

    /// Filter selecting exactly `signers`.
    ///
    /// # Errors
    ///
    /// `InvalidSigner` if any identity is not declared.
    pub fn filter_from_signers<'a>(
        &self,
        signers: impl IntoIterator<Item = &'a SignerId>,
    ) -> CryptoResult<SignerSetFilter> {
        signers.into_iter().try_fold(SignerSetFilter::empty(), |filter, signer| {
            let index = self.index_of(signer).ok_or_else(|| CryptoError::InvalidSigner {
                signer: signer.short(),
                reason: "not a declared signer".into(),
            })?;
            Ok(filter.with_index(index))
        })
    }

    /// Signers selected by `filter`, in roster order. Bits beyond the roster
    /// are ignored.
    #[must_use]
    pub fn signers_in(&self, filter: SignerSetFilter) -> Vec<SignerId> {
        filter
            .indices()
            .filter_map(|index| self.signers.get(index).copied())
            .collect()
    }

    fn check_in_range(&self, filter: SignerSetFilter) -> CryptoResult<()> {
        if filter.is_subset_of(self.full_filter()) {
            Ok(())
        } else {
            Err(CryptoError::InvalidFilter {
                filter,
                reason: format!("selects signers beyond the {} declared", self.num_signers()),
            })
        }
    }

    /// Check that `filter` can serve as an aggregate filter.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` unless `T <= popcount <= N` and every bit names a
    /// declared signer.
    pub fn validate_aggregate_filter(&self, filter: SignerSetFilter) -> CryptoResult<()> {
        self.check_in_range(filter)?;
        let count = filter.popcount();
        if count < self.threshold || count > self.num_signers() {
            return Err(CryptoError::InvalidFilter {
                filter,
                reason: format!(
                    "aggregate selects {count} signers, need between {} and {}",
                    self.threshold,
                    self.num_signers()
                ),
            });
        }
        Ok(())
    }

    /// Check that `filter` can serve as a permutation filter.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` unless `popcount == T` and every bit names a declared
    /// signer.
    pub fn validate_permutation_filter(&self, filter: SignerSetFilter) -> CryptoResult<()> {
        self.check_in_range(filter)?;
        if filter.popcount() != self.threshold {
            return Err(CryptoError::InvalidFilter {
                filter,
                reason: format!(
                    "permutation selects {} signers, threshold is {}",
                    filter.popcount(),
                    self.threshold
                ),
            });
        }
        Ok(())
    }

    /// Every `T`-subset of `aggregate`, in canonical order.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` if `aggregate` is not a valid aggregate filter.
    pub fn permutation_filters(
        &self,
        aggregate: SignerSetFilter,
    ) -> CryptoResult<PermutationFilters> {
        self.validate_aggregate_filter(aggregate)?;
        Ok(PermutationFilters::new(aggregate, self.threshold))
    }

    /// The `T`-subsets of `aggregate` that contain `signer`, in canonical
    /// order. Yields `C(popcount - 1, T - 1)` filters for a member of the
    /// aggregate and nothing for anyone else.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` if `aggregate` is not a valid aggregate filter.
    pub fn permutations_containing(
        &self,
        signer: &SignerId,
        aggregate: SignerSetFilter,
    ) -> CryptoResult<impl Iterator<Item = SignerSetFilter>> {
        let index = self.index_of(signer);
        let member = index.is_some_and(|i| aggregate.contains_index(i));
        let filters = self.permutation_filters(aggregate)?;
        Ok(filters.filter(move |f| member && index.is_some_and(|i| f.contains_index(i))))
    }

    /// Number of permutation filters each member of `aggregate` belongs to.
    #[must_use]
    pub fn permutations_per_member(&self, aggregate: SignerSetFilter) -> u32 {
        let count = aggregate.popcount();
        if count == 0 || self.threshold == 0 {
            return 0;
        }
        n_choose_k(count - 1, self.threshold - 1)
    }

    /// Position of `filter` in `signer`'s own enumeration of
    /// [`permutations_containing`](Self::permutations_containing).
    ///
    /// # Errors
    ///
    /// `InvalidFilter` if `aggregate` is not a valid aggregate filter.
    pub fn permutation_index(
        &self,
        signer: &SignerId,
        aggregate: SignerSetFilter,
        filter: SignerSetFilter,
    ) -> CryptoResult<Option<usize>> {
        Ok(self
            .permutations_containing(signer, aggregate)?
            .position(|candidate| candidate == filter))
    }
}
