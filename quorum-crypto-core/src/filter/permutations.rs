//! Canonical enumeration of permutation filters.
//!
//! All `T`-sized subsets of an aggregate filter are produced in ascending
//! numeric order of their bit patterns. The walk runs Gosper's hack over the
//! *compressed* index space (one bit per aggregate member) and expands each
//! combination back onto the aggregate's bit positions. The expansion is
//! monotone, so ascending compressed order is ascending filter order.

use super::{SignerSetFilter, MAX_SIGNERS};

/// Binomial coefficient `C(n, k)`; zero when `k > n`.
#[must_use]
pub fn n_choose_k(n: u32, k: u32) -> u32 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..u64::from(k) {
        result = result * (u64::from(n) - i) / (i + 1);
    }
    u32::try_from(result).unwrap_or(u32::MAX)
}

/// Lazy iterator over every `threshold`-sized subset of an aggregate filter.
#[derive(Debug, Clone)]
pub struct PermutationFilters {
    positions: [u8; MAX_SIGNERS],
    width: u32,
    threshold: u32,
    next: Option<u32>,
}

impl PermutationFilters {
    /// Enumerate the `threshold`-subsets of `aggregate`.
    ///
    /// Callers validate the aggregate first (see
    /// [`SignerRoster::permutation_filters`](super::SignerRoster::permutation_filters));
    /// an aggregate smaller than the threshold simply yields nothing.
    #[must_use]
    pub fn new(aggregate: SignerSetFilter, threshold: u32) -> Self {
        let mut positions = [0u8; MAX_SIGNERS];
        let mut width = 0u32;
        for index in aggregate.indices() {
            positions[width as usize] = index as u8;
            width += 1;
        }

        let next = if threshold == 0 || threshold > width {
            None
        } else {
            Some((1u32 << threshold) - 1)
        };

        Self {
            positions,
            width,
            threshold,
            next,
        }
    }

    /// Number of filters the full enumeration yields.
    #[must_use]
    pub fn total(&self) -> u32 {
        if self.threshold == 0 {
            return 0;
        }
        n_choose_k(self.width, self.threshold)
    }

    fn expand(&self, compressed: u32) -> SignerSetFilter {
        let mut bits = 0u16;
        for slot in 0..self.width {
            if compressed & (1 << slot) != 0 {
                bits |= 1u16 << self.positions[slot as usize];
            }
        }
        SignerSetFilter::from_bits(bits)
    }
}

impl Iterator for PermutationFilters {
    type Item = SignerSetFilter;

    fn next(&mut self) -> Option<SignerSetFilter> {
        let current = self.next?;

        // Gosper's hack: next larger integer with the same popcount.
        let lowest = current & current.wrapping_neg();
        let ripple = current + lowest;
        let successor = (((ripple ^ current) >> 2) / lowest) | ripple;
        self.next = (successor < (1u32 << self.width)).then_some(successor);

        Some(self.expand(current))
    }
}
