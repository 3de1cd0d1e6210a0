//! Signer-set filter algebra.
//!
//! A [`SignerSetFilter`] is a fixed-width bitset over the account's roster:
//! bit `i` selects the signer at roster position `i`. Ceremonies use two kinds
//! of filter:
//!
//! - an **aggregate filter** names every signer invited to a ceremony
//!   (`T <= popcount <= N`);
//! - a **permutation filter** is one concrete `T`-sized subset of an
//!   aggregate filter.
//!
//! Initialization sets index their nonce lists by the position of a
//! permutation filter in the canonical enumeration ([`permutations`]), so
//! every participant must enumerate in exactly the same order.

use core::fmt;

use serde::{Deserialize, Serialize};

pub mod permutations;
pub mod roster;

pub use permutations::{n_choose_k, PermutationFilters};
pub use roster::SignerRoster;

/// Maximum number of signers a filter can address.
pub const MAX_SIGNERS: usize = 16;

/// Bitmask over the fixed, ordered signer roster.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SignerSetFilter(u16);

impl SignerSetFilter {
    /// Filter from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// The empty filter.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// This filter with roster position `index` added.
    ///
    /// # Panics
    ///
    /// Panics if `index >= MAX_SIGNERS`; roster positions are bounded when
    /// the roster is built, so this is a local programming error.
    #[must_use]
    pub fn with_index(self, index: usize) -> Self {
        assert!(index < MAX_SIGNERS, "signer index {index} out of range");
        Self(self.0 | (1u16 << index))
    }

    /// Whether roster position `index` is selected.
    #[must_use]
    pub fn contains_index(self, index: usize) -> bool {
        index < MAX_SIGNERS && self.0 & (1u16 << index) != 0
    }

    /// Number of selected signers.
    #[must_use]
    pub const fn popcount(self) -> u32 {
        self.0.count_ones()
    }

    /// Signers selected by both filters.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Signers selected by either filter.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every signer selected here is also selected by `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Whether no signer is selected.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Selected roster positions, ascending.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..MAX_SIGNERS).filter(move |&i| self.contains_index(i))
    }
}

impl fmt::Debug for SignerSetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerSetFilter({:#b})", self.0)
    }
}

impl fmt::Display for SignerSetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}
