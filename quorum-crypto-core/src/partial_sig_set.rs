//! Round 2: partial signature sets.
//!
//! A [`PartialSigSet`] holds one signer's partial signature for every proof
//! in the batch, all for the same permutation filter. A filter is signed
//! all-or-nothing: if any proof fails, the signer publishes nothing for that
//! filter and the filter's remaining nonce records are discarded.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{attempt_partial_signature, PartialSignature, ProofRequest};
use crate::filter::{SignerRoster, SignerSetFilter, MAX_SIGNERS};
use crate::init_set::InitSet;
use crate::keys::KeyShareProvider;
use crate::nonce::{NoncePubkeys, NonceRecordKey, NonceVault};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::sanitize::sanitize_hex;
use crate::types::serde_hex;
use crate::types::{ArtifactKind, RejectedArtifact, SignerId};

/// One signer's round-2 broadcast for one permutation filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSigSet {
    /// Sender
    pub signer: SignerId,
    /// Permutation filter signed for
    pub filter: SignerSetFilter,
    /// Message every partial signs
    #[serde(with = "serde_hex::bytes32")]
    pub message: [u8; 32],
    /// One partial per proof, in batch order
    pub partials: Vec<PartialSignature>,
}

impl PartialSigSet {
    fn reject(&self, detail: impl Into<String>) -> CryptoError {
        CryptoError::BadPartialSigSet {
            signer: self.signer.short(),
            filter: self.filter,
            detail: detail.into(),
        }
    }

    /// Check this set against the ceremony it claims to belong to.
    ///
    /// # Errors
    ///
    /// `BadPartialSigSet` describing the first violation found.
    pub fn validate(
        &self,
        roster: &SignerRoster,
        aggregate: SignerSetFilter,
        expected_message: &[u8; 32],
        expected_proofs: &[ProofRequest],
    ) -> CryptoResult<()> {
        roster
            .validate_permutation_filter(self.filter)
            .map_err(|e| self.reject(e.to_string()))?;
        if !self.filter.is_subset_of(aggregate) {
            return Err(self.reject(format!("filter is outside aggregate {aggregate}")));
        }
        if !roster.is_member(&self.signer, self.filter) {
            return Err(self.reject("signer is not a member of the filter"));
        }
        if &self.message != expected_message {
            return Err(self.reject(format!("message {}", sanitize_hex(&self.message))));
        }
        if self.partials.len() != expected_proofs.len() {
            return Err(self.reject(format!(
                "expected {} partial signatures, got {}",
                expected_proofs.len(),
                self.partials.len()
            )));
        }

        let kind = expected_proofs
            .first()
            .map(|request| request.proposal.kind());
        for (i, (partial, request)) in self.partials.iter().zip(expected_proofs).enumerate() {
            if partial.message() != &self.message {
                return Err(self.reject(format!("partial {i} signs another message")));
            }
            if Some(partial.kind()) != kind {
                return Err(self.reject(format!("partial {i} is a {} share", partial.kind())));
            }
            if partial.proof_key() != request.proposal.proof_key() {
                return Err(self.reject(format!(
                    "partial {i} is for proof key {}",
                    sanitize_hex(partial.proof_key())
                )));
            }
        }
        Ok(())
    }

    /// Byte-stable JSON encoding.
    ///
    /// # Errors
    ///
    /// `SerializationError` if encoding fails.
    pub fn to_wire(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::SerializationError(e.to_string()))
    }

    /// Decode [`to_wire`](Self::to_wire) output. Does not validate.
    ///
    /// # Errors
    ///
    /// `DeserializationError` on malformed input.
    pub fn from_wire(bytes: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::DeserializationError(e.to_string()))
    }
}

/// A filter the local signer could not sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterFailure {
    /// The filter
    pub filter: SignerSetFilter,
    /// Proof key that failed, if the failure was proof-specific
    pub proof_key: Option<[u8; 32]>,
    /// What went wrong
    pub error: CryptoError,
}

/// Outcome of [`build_partial_sig_sets`].
#[derive(Debug, Clone, Default)]
pub struct PartialSigSetBuild {
    /// One set per successfully signed filter, in canonical order
    pub sets: Vec<PartialSigSet>,
    /// Filters attempted but not signed
    pub failures: Vec<FilterFailure>,
}

/// Sign every filter of `aggregate` that contains the local signer and only
/// signers in `available`.
///
/// Each signer's init set lists its filters positionally, so a per-signer
/// counter is advanced over the global canonical enumeration to find where a
/// filter sits in each member's set.
///
/// # Errors
///
/// Ceremony-level faults only (invalid aggregate, local signer missing from
/// the roster); per-filter faults are reported in
/// [`PartialSigSetBuild::failures`].
pub fn build_partial_sig_sets<P: KeyShareProvider + ?Sized>(
    account: &P,
    batch: &[ProofRequest],
    aggregate: SignerSetFilter,
    message: &[u8; 32],
    available: SignerSetFilter,
    init_sets: &[InitSet],
    vault: &NonceVault,
) -> CryptoResult<PartialSigSetBuild> {
    let roster = account.roster();
    let local_signer = account.local_signer();
    let local_index = roster.index_of(local_signer).ok_or_else(|| CryptoError::InvalidSigner {
        signer: local_signer.short(),
        reason: "local signer is not in the roster".into(),
    })?;

    let mut by_index: [Option<&InitSet>; MAX_SIGNERS] = [None; MAX_SIGNERS];
    for set in init_sets {
        if let Some(index) = roster.index_of(&set.signer) {
            by_index[index].get_or_insert(set);
        }
    }
    let with_init_set = (0..MAX_SIGNERS)
        .filter(|&i| by_index[i].is_some())
        .fold(SignerSetFilter::empty(), SignerSetFilter::with_index);
    let available = available.intersect(with_init_set);

    let mut counters = [0usize; MAX_SIGNERS];
    let mut outcome = PartialSigSetBuild::default();

    for filter in roster.permutation_filters(aggregate)? {
        let positions: Vec<(usize, usize)> = filter.indices().map(|i| (i, counters[i])).collect();
        for &(i, _) in &positions {
            counters[i] += 1;
        }

        if !filter.contains_index(local_index) || !filter.is_subset_of(available) {
            continue;
        }

        let members: Vec<(&InitSet, usize)> = positions
            .iter()
            .filter_map(|&(i, position)| by_index[i].map(|set| (set, position)))
            .collect();

        match sign_filter(account, batch, filter, message, local_index, &members, vault) {
            Ok(partials) => {
                debug!(filter = %filter, proofs = partials.len(), "Signed filter");
                outcome.sets.push(PartialSigSet {
                    signer: *local_signer,
                    filter,
                    message: *message,
                    partials,
                });
            }
            Err((proof_key, error)) => {
                let mut discarded = 0usize;
                for request in batch {
                    let key = NonceRecordKey::new(*message, *request.proposal.proof_key(), filter);
                    if vault.remove(&key) {
                        discarded += 1;
                    }
                }
                let failed_proof = proof_key.as_ref().map(sanitize_hex).unwrap_or_default();
                warn!(
                    filter = %filter,
                    proof_key = %failed_proof,
                    discarded,
                    error = %error,
                    "Could not sign filter"
                );
                outcome.failures.push(FilterFailure {
                    filter,
                    proof_key,
                    error,
                });
            }
        }
    }

    Ok(outcome)
}

type FilterError = (Option<[u8; 32]>, CryptoError);

fn sign_filter<P: KeyShareProvider + ?Sized>(
    account: &P,
    batch: &[ProofRequest],
    filter: SignerSetFilter,
    message: &[u8; 32],
    local_index: usize,
    members: &[(&InitSet, usize)],
    vault: &NonceVault,
) -> Result<Vec<PartialSignature>, FilterError> {
    let roster = account.roster();
    let signing_key = account
        .aggregate_signing_key(filter)
        .map_err(|e| (None, e))?;
    if members.len() != roster.threshold() as usize {
        return Err((
            None,
            CryptoError::InternalError(format!("filter {filter} is missing an init set")),
        ));
    }

    let mut partials = Vec::with_capacity(batch.len());
    for (proof_index, request) in batch.iter().enumerate() {
        let proposal = &request.proposal;
        let proof_key = *proposal.proof_key();
        let fail = |error| (Some(proof_key), error);

        let filter_nonces = members
            .iter()
            .map(|(set, position)| {
                set.nonces_for(proof_index, *position).ok_or_else(|| {
                    CryptoError::InternalError(format!(
                        "init set of {} has no entry for proof {proof_index} position {position}",
                        set.signer
                    ))
                })
            })
            .collect::<CryptoResult<Vec<&[NoncePubkeys]>>>()
            .map_err(fail)?;

        let local_set_position = members
            .iter()
            .position(|(set, _)| roster.index_of(&set.signer) == Some(local_index))
            .ok_or_else(|| fail(CryptoError::InternalError("local init set missing".into())))?;
        let key = NonceRecordKey::new(*message, proof_key, filter);
        for (base, published) in proposal
            .nonce_base_points()
            .iter()
            .zip(filter_nonces[local_set_position])
        {
            let stored = vault.public_commitments_for_base(&key, base).map_err(fail)?;
            if &stored != published {
                return Err(fail(CryptoError::PartialSignatureFailed {
                    proof_key: sanitize_hex(&proof_key),
                    filter,
                    detail: "published commitments do not match the nonce vault".into(),
                }));
            }
        }

        let partial = attempt_partial_signature(
            proposal,
            &request.secrets,
            &signing_key,
            roster.threshold(),
            &filter_nonces,
            filter,
            vault,
        )
        .map_err(fail)?;
        partials.push(partial);
    }
    Ok(partials)
}

/// Accepted partial signature sets of one ceremony, at most one per
/// (filter, signer).
#[derive(Debug, Clone, Default)]
pub struct PartialSigSetCollection {
    sets: Vec<PartialSigSet>,
    seen: HashSet<(SignerSetFilter, SignerId)>,
}

impl PartialSigSetCollection {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one of the local signer's own sets.
    pub fn insert_local(&mut self, set: PartialSigSet) {
        if self.seen.insert((set.filter, set.signer)) {
            self.sets.push(set);
        }
    }

    /// Validate and accept a peer set. `local_signer`'s identity is never
    /// accepted from a peer.
    ///
    /// # Errors
    ///
    /// The [`RejectedArtifact`] describing why the set was not accepted.
    pub fn offer(
        &mut self,
        set: PartialSigSet,
        local_signer: &SignerId,
        roster: &SignerRoster,
        aggregate: SignerSetFilter,
        message: &[u8; 32],
        batch: &[ProofRequest],
    ) -> Result<(), RejectedArtifact> {
        let rejected = |error| RejectedArtifact {
            signer: set.signer,
            filter: set.filter,
            artifact: ArtifactKind::PartialSigSet,
            error,
        };

        if &set.signer == local_signer {
            return Err(rejected(set.reject("peer set claims the local identity")));
        }
        if self.seen.contains(&(set.filter, set.signer)) {
            return Err(rejected(set.reject("duplicate partial signature set")));
        }
        set.validate(roster, aggregate, message, batch)
            .map_err(rejected)?;

        self.seen.insert((set.filter, set.signer));
        self.sets.push(set);
        Ok(())
    }

    /// Accepted sets in arrival order.
    #[must_use]
    pub fn sets(&self) -> &[PartialSigSet] {
        &self.sets
    }

    /// Accepted sets for `filter`, in roster order of their signers.
    #[must_use]
    pub fn for_filter(&self, roster: &SignerRoster, filter: SignerSetFilter) -> Vec<&PartialSigSet> {
        let mut sets: Vec<&PartialSigSet> =
            self.sets.iter().filter(|s| s.filter == filter).collect();
        sets.sort_by_key(|s| roster.index_of(&s.signer));
        sets
    }

    /// Number of distinct signers with an accepted set for `filter`.
    #[must_use]
    pub fn coverage(&self, filter: SignerSetFilter) -> u32 {
        self.sets.iter().filter(|s| s.filter == filter).count() as u32
    }

    /// Consume into the accepted sets.
    #[must_use]
    pub fn into_sets(self) -> Vec<PartialSigSet> {
        self.sets
    }
}

/// Valid and rejected outcome of filtering partial signature sets.
#[derive(Debug, Clone)]
pub struct FilteredPartialSigSets {
    /// Accepted sets
    pub valid: Vec<PartialSigSet>,
    /// Everything else
    pub rejected: Vec<RejectedArtifact>,
}

/// Partition peer `sets` into accepted and rejected, deduplicating by
/// (filter, signer).
pub fn filter_partial_sig_sets(
    sets: impl IntoIterator<Item = PartialSigSet>,
    local_signer: &SignerId,
    roster: &SignerRoster,
    aggregate: SignerSetFilter,
    message: &[u8; 32],
    batch: &[ProofRequest],
) -> FilteredPartialSigSets {
    let mut collection = PartialSigSetCollection::new();
    let mut rejected = Vec::new();
    for set in sets {
        if let Err(rejection) = collection.offer(set, local_signer, roster, aggregate, message, batch) {
            warn!(%rejection, "Rejected partial signature set");
            rejected.push(rejection);
        }
    }
    FilteredPartialSigSets {
        valid: collection.into_sets(),
        rejected,
    }
}
