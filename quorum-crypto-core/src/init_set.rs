//! Round 1: initialization sets.
//!
//! An [`InitSet`] is one signer's nonce commitments for a ceremony. For every
//! proof in the batch it lists, per permutation filter the signer belongs
//! to, one [`NoncePubkeys`] per base point of the proof family:
//!
//! ```text
//! entries[proof].nonces[filter_position][base_point]
//! ```
//!
//! `filter_position` is the filter's index in the signer's own canonical
//! enumeration ([`SignerRoster::permutations_containing`]); the filter value
//! itself is not on the wire.

use std::collections::HashSet;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{validate_batch, ProofRequest};
use crate::filter::{SignerRoster, SignerSetFilter};
use crate::nonce::{NoncePubkeys, NonceRecordKey, NonceVault};
use crate::types::errors::{CryptoError, CryptoResult, InitSetRejection};
use crate::types::sanitize::sanitize_hex;
use crate::types::{ArtifactKind, RejectedArtifact, SignerId};
use crate::types::serde_hex;

/// Commitments for one proof key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitSetEntry {
    /// Proof key the commitments belong to
    #[serde(with = "serde_hex::bytes32")]
    pub proof_key: [u8; 32],
    /// Per filter position, per base point
    pub nonces: Vec<Vec<NoncePubkeys>>,
}

/// One signer's round-1 broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitSet {
    /// Sender
    pub signer: SignerId,
    /// Aggregate filter of the ceremony
    pub aggregate_filter: SignerSetFilter,
    /// Message every proof signs
    #[serde(with = "serde_hex::bytes32")]
    pub message: [u8; 32],
    /// One entry per proof, in batch order
    pub entries: Vec<InitSetEntry>,
}

fn reject(signer: &SignerId, reason: InitSetRejection, detail: impl Into<String>) -> CryptoError {
    CryptoError::BadInitSet {
        signer: signer.short(),
        reason,
        detail: detail.into(),
    }
}

impl InitSet {
    /// Build the local signer's set, creating nonce records as needed.
    ///
    /// Rebuilding before any record is consumed yields the same set.
    ///
    /// # Errors
    ///
    /// - `InvalidFilter` for an invalid aggregate filter
    /// - `InvalidSigner` if `local_signer` is not invited by `aggregate`
    /// - `InvalidProposal` for an invalid batch
    pub fn build<R: RngCore + CryptoRng>(
        roster: &SignerRoster,
        local_signer: &SignerId,
        aggregate: SignerSetFilter,
        message: &[u8; 32],
        batch: &[ProofRequest],
        vault: &NonceVault,
        rng: &mut R,
    ) -> CryptoResult<Self> {
        roster.validate_aggregate_filter(aggregate)?;
        if !roster.is_member(local_signer, aggregate) {
            return Err(CryptoError::InvalidSigner {
                signer: local_signer.short(),
                reason: format!("not invited by aggregate filter {aggregate}"),
            });
        }
        validate_batch(message, batch)?;

        let filters: Vec<SignerSetFilter> =
            roster.permutations_containing(local_signer, aggregate)?.collect();

        let mut entries = Vec::with_capacity(batch.len());
        for request in batch {
            let proposal = &request.proposal;
            let bases = proposal.nonce_base_points();
            let mut nonces = Vec::with_capacity(filters.len());
            for filter in &filters {
                let key = NonceRecordKey::new(*message, *proposal.proof_key(), *filter);
                nonces.push(vault.ensure(&key, &bases, rng));
            }
            entries.push(InitSetEntry {
                proof_key: *proposal.proof_key(),
                nonces,
            });
        }

        debug!(
            signer = %local_signer,
            aggregate = %aggregate,
            message = %sanitize_hex(message),
            proofs = batch.len(),
            filters = filters.len(),
            "Built initialization set"
        );

        Ok(Self {
            signer: *local_signer,
            aggregate_filter: aggregate,
            message: *message,
            entries,
        })
    }

    /// Check this set against the ceremony it claims to belong to.
    ///
    /// # Errors
    ///
    /// `BadInitSet` with the reason of the first violation found.
    pub fn validate(
        &self,
        roster: &SignerRoster,
        expected_aggregate: SignerSetFilter,
        expected_message: &[u8; 32],
        expected_proofs: &[ProofRequest],
    ) -> CryptoResult<()> {
        let signer = &self.signer;
        if roster.index_of(signer).is_none() {
            return Err(reject(signer, InitSetRejection::UnexpectedSigner, "not a declared signer"));
        }
        if self.aggregate_filter != expected_aggregate {
            return Err(reject(
                signer,
                InitSetRejection::UnexpectedFilter,
                format!("expected aggregate {expected_aggregate}, got {}", self.aggregate_filter),
            ));
        }
        if !roster.is_member(signer, expected_aggregate) {
            return Err(reject(
                signer,
                InitSetRejection::UnexpectedSigner,
                "not invited by the aggregate filter",
            ));
        }
        if &self.message != expected_message {
            return Err(reject(
                signer,
                InitSetRejection::UnexpectedMessage,
                format!("message {}", sanitize_hex(&self.message)),
            ));
        }
        if self.entries.len() != expected_proofs.len() {
            return Err(reject(
                signer,
                InitSetRejection::SemanticsFailure,
                format!("expected {} proof entries, got {}", expected_proofs.len(), self.entries.len()),
            ));
        }

        let filter_count = roster.permutations_per_member(expected_aggregate) as usize;
        for (entry, request) in self.entries.iter().zip(expected_proofs) {
            let proposal = &request.proposal;
            if &entry.proof_key != proposal.proof_key() {
                return Err(reject(
                    signer,
                    InitSetRejection::UnexpectedProofKey,
                    format!("proof key {}", sanitize_hex(&entry.proof_key)),
                ));
            }
            if entry.nonces.len() != filter_count {
                return Err(reject(
                    signer,
                    InitSetRejection::SemanticsFailure,
                    format!(
                        "expected {filter_count} filter entries for proof {}, got {}",
                        sanitize_hex(&entry.proof_key),
                        entry.nonces.len()
                    ),
                ));
            }

            let base_count = proposal.kind().required_base_point_count();
            for (position, commitments) in entry.nonces.iter().enumerate() {
                if commitments.len() != base_count {
                    return Err(reject(
                        signer,
                        InitSetRejection::SemanticsFailure,
                        format!(
                            "filter entry {position} has {} base points, expected {base_count}",
                            commitments.len()
                        ),
                    ));
                }
                for pubkeys in commitments {
                    pubkeys.decode().map_err(|e| {
                        reject(signer, InitSetRejection::SemanticsFailure, e.to_string())
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Commitments for proof `proof_index` at filter position `filter_index`.
    #[must_use]
    pub fn nonces_for(&self, proof_index: usize, filter_index: usize) -> Option<&[NoncePubkeys]> {
        self.entries
            .get(proof_index)?
            .nonces
            .get(filter_index)
            .map(Vec::as_slice)
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

/// Accepted initialization sets of one ceremony, at most one per signer.
///
/// The local signer's own set is accepted first and can never be displaced;
/// a peer set claiming the local identity is rejected. For everyone else the
/// first valid set wins and later ones are rejected, since a second set from
/// the same signer is either a replay or an attempt to swap commitments.
#[derive(Debug, Clone)]
pub struct InitSetCollection {
    local_signer: SignerId,
    sets: Vec<InitSet>,
    seen: HashSet<SignerId>,
}

impl InitSetCollection {
    /// Start a collection from the local signer's own set.
    #[must_use]
    pub fn new(local_set: InitSet) -> Self {
        let local_signer = local_set.signer;
        Self {
            local_signer,
            seen: HashSet::from([local_signer]),
            sets: vec![local_set],
        }
    }

    /// Validate and accept a peer set.
    ///
    /// # Errors
    ///
    /// The [`RejectedArtifact`] describing why the set was not accepted.
    pub fn offer(
        &mut self,
        set: InitSet,
        roster: &SignerRoster,
        aggregate: SignerSetFilter,
        message: &[u8; 32],
        batch: &[ProofRequest],
    ) -> Result<(), RejectedArtifact> {
        let rejected = |error| RejectedArtifact {
            signer: set.signer,
            filter: set.aggregate_filter,
            artifact: ArtifactKind::InitSet,
            error,
        };

        if set.signer == self.local_signer {
            return Err(rejected(reject(
                &set.signer,
                InitSetRejection::UnexpectedSigner,
                "peer set claims the local identity",
            )));
        }
        if self.seen.contains(&set.signer) {
            return Err(rejected(reject(
                &set.signer,
                InitSetRejection::UnexpectedSigner,
                "duplicate initialization set",
            )));
        }
        set.validate(roster, aggregate, message, batch)
            .map_err(rejected)?;

        self.seen.insert(set.signer);
        self.sets.push(set);
        Ok(())
    }

    /// Accepted sets; the local set first, then peers in arrival order.
    #[must_use]
    pub fn sets(&self) -> &[InitSet] {
        &self.sets
    }

    /// Accepted set of `signer`.
    #[must_use]
    pub fn get(&self, signer: &SignerId) -> Option<&InitSet> {
        self.sets.iter().find(|s| &s.signer == signer)
    }

    /// Filter of every signer with an accepted set.
    #[must_use]
    pub fn available(&self, roster: &SignerRoster) -> SignerSetFilter {
        self.sets
            .iter()
            .filter_map(|s| roster.index_of(&s.signer))
            .fold(SignerSetFilter::empty(), SignerSetFilter::with_index)
    }

    /// Consume into the accepted sets.
    #[must_use]
    pub fn into_sets(self) -> Vec<InitSet> {
        self.sets
    }
}

/// Valid and rejected outcome of filtering a batch of peer sets.
#[derive(Debug, Clone)]
pub struct FilteredInitSets {
    /// Accepted sets, local first
    pub valid: Vec<InitSet>,
    /// Everything else
    pub rejected: Vec<RejectedArtifact>,
}

/// Partition `peers` into accepted and rejected sets, deduplicating by
/// signer. The local set is always kept.
///
/// # Errors
///
/// Returns the local set's own validation error: a malformed local set is a
/// local fault, not a peer one.
pub fn filter_init_sets(
    local_set: InitSet,
    peers: impl IntoIterator<Item = InitSet>,
    roster: &SignerRoster,
    aggregate: SignerSetFilter,
    message: &[u8; 32],
    batch: &[ProofRequest],
) -> CryptoResult<FilteredInitSets> {
    local_set.validate(roster, aggregate, message, batch)?;

    let mut collection = InitSetCollection::new(local_set);
    let mut rejected = Vec::new();
    for set in peers {
        if let Err(rejection) = collection.offer(set, roster, aggregate, message, batch) {
            warn!(%rejection, "Rejected initialization set");
            rejected.push(rejection);
        }
    }

    Ok(FilteredInitSets {
        valid: collection.into_sets(),
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{clsag_request, composition_request, test_group, TestGroup};
    use rand_core::OsRng;

    const MESSAGE: [u8; 32] = [0x42; 32];

    fn build(group: &TestGroup, index: usize, batch: &[ProofRequest]) -> InitSet {
        InitSet::build(
            &group.roster,
            &group.signer(index),
            group.roster.full_filter(),
            &MESSAGE,
            batch,
            &group.vaults[index],
            &mut OsRng,
        )
        .unwrap()
    }

    fn reason(result: CryptoResult<()>) -> InitSetRejection {
        match result {
            Err(CryptoError::BadInitSet { reason, .. }) => reason,
            other => panic!("expected BadInitSet, got {other:?}"),
        }
    }

    #[test]
    fn test_build_shape() {
        let group = test_group(4, 2);
        let batch = vec![clsag_request(&group, MESSAGE), clsag_request(&group, MESSAGE)];
        let set = build(&group, 1, &batch);

        assert_eq!(set.entries.len(), 2);
        for entry in &set.entries {
            // C(3, 1)
            assert_eq!(entry.nonces.len(), 3);
            assert!(entry.nonces.iter().all(|n| n.len() == 2));
        }
        assert!(set.validate(&group.roster, group.roster.full_filter(), &MESSAGE, &batch).is_ok());
        assert_eq!(group.vaults[1].len(), 6);
    }

    #[test]
    fn test_rebuild_is_stable() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        assert_eq!(build(&group, 0, &batch), build(&group, 0, &batch));
    }

    #[test]
    fn test_positions_follow_enumeration() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let set = build(&group, 2, &batch);
        let signer = group.signer(2);
        let proof_key = *batch[0].proposal.proof_key();

        for (position, filter) in group
            .roster
            .permutations_containing(&signer, group.roster.full_filter())
            .unwrap()
            .enumerate()
        {
            let key = NonceRecordKey::new(MESSAGE, proof_key, filter);
            let stored = group.vaults[2]
                .public_commitments_for_base(&key, &batch[0].proposal.nonce_base_points()[0])
                .unwrap();
            assert_eq!(set.nonces_for(0, position).unwrap()[0], stored);
        }
        assert!(set.nonces_for(0, 2).is_none());
        assert!(set.nonces_for(1, 0).is_none());
    }

    #[test]
    fn test_validation_reasons() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let full = group.roster.full_filter();
        let set = build(&group, 0, &batch);

        let mut wrong_signer = set.clone();
        wrong_signer.signer = SignerId([0xee; 32]);
        assert_eq!(
            reason(wrong_signer.validate(&group.roster, full, &MESSAGE, &batch)),
            InitSetRejection::UnexpectedSigner
        );

        assert_eq!(
            reason(set.validate(&group.roster, SignerSetFilter::from_bits(0b011), &MESSAGE, &batch)),
            InitSetRejection::UnexpectedFilter
        );

        assert_eq!(
            reason(set.validate(&group.roster, full, &[0; 32], &batch)),
            InitSetRejection::UnexpectedMessage
        );

        let other = vec![composition_request(&group, MESSAGE)];
        assert_eq!(
            reason(set.validate(&group.roster, full, &MESSAGE, &other)),
            InitSetRejection::UnexpectedProofKey
        );

        let mut short = set.clone();
        short.entries[0].nonces.pop();
        assert_eq!(
            reason(short.validate(&group.roster, full, &MESSAGE, &batch)),
            InitSetRejection::SemanticsFailure
        );

        let mut extra_base = set.clone();
        let duplicate = extra_base.entries[0].nonces[0][0];
        extra_base.entries[0].nonces[0].push(duplicate);
        assert_eq!(
            reason(extra_base.validate(&group.roster, full, &MESSAGE, &batch)),
            InitSetRejection::SemanticsFailure
        );

        let mut missing_entry = set;
        missing_entry.entries.clear();
        assert_eq!(
            reason(missing_entry.validate(&group.roster, full, &MESSAGE, &batch)),
            InitSetRejection::SemanticsFailure
        );
    }

    #[test]
    fn test_uninvited_signer_rejected() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let aggregate = SignerSetFilter::from_bits(0b011);
        let result = InitSet::build(
            &group.roster,
            &group.signer(2),
            aggregate,
            &MESSAGE,
            &batch,
            &group.vaults[2],
            &mut OsRng,
        );
        assert!(matches!(result, Err(CryptoError::InvalidSigner { .. })));

        let mut set = InitSet::build(
            &group.roster,
            &group.signer(0),
            aggregate,
            &MESSAGE,
            &batch,
            &group.vaults[0],
            &mut OsRng,
        )
        .unwrap();
        set.signer = group.signer(2);
        assert_eq!(
            reason(set.validate(&group.roster, aggregate, &MESSAGE, &batch)),
            InitSetRejection::UnexpectedSigner
        );
    }

    #[test]
    fn test_undecodable_commitment_rejected() {
        let group = test_group(2, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut set = build(&group, 0, &batch);
        // y = 2 has no x on the curve.
        let mut off_curve = [0u8; 32];
        off_curve[0] = 2;
        set.entries[0].nonces[0][0].first = off_curve;
        let result = set.validate(&group.roster, group.roster.full_filter(), &MESSAGE, &batch);
        assert_eq!(reason(result), InitSetRejection::SemanticsFailure);
    }

    #[test]
    fn test_filter_dedups_and_protects_local_identity() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let full = group.roster.full_filter();
        let local = build(&group, 0, &batch);
        let peer = build(&group, 1, &batch);

        let mut replay = peer.clone();
        replay.entries[0].nonces.swap(0, 1);
        let mut impostor = build(&group, 2, &batch);
        impostor.signer = group.signer(0);

        let filtered = filter_init_sets(
            local.clone(),
            vec![peer.clone(), replay, impostor],
            &group.roster,
            full,
            &MESSAGE,
            &batch,
        )
        .unwrap();

        assert_eq!(filtered.valid, vec![local, peer]);
        assert_eq!(filtered.rejected.len(), 2);
        assert!(filtered
            .rejected
            .iter()
            .all(|r| r.artifact == ArtifactKind::InitSet && r.error.is_peer_fault()));
    }

    #[test]
    fn test_invalid_peer_does_not_block_later_valid_set() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let local = build(&group, 0, &batch);
        let peer = build(&group, 1, &batch);
        let mut broken = peer.clone();
        broken.message = [0; 32];

        let mut collection = InitSetCollection::new(local);
        assert!(collection
            .offer(broken, &group.roster, group.roster.full_filter(), &MESSAGE, &batch)
            .is_err());
        assert!(collection
            .offer(peer, &group.roster, group.roster.full_filter(), &MESSAGE, &batch)
            .is_ok());
        assert_eq!(collection.available(&group.roster), SignerSetFilter::from_bits(0b011));
    }

    #[test]
    fn test_wire_round_trip_keeps_validity() {
        let group = test_group(3, 2);
        let batch = vec![clsag_request(&group, MESSAGE)];
        let set = build(&group, 1, &batch);

        let decoded = InitSet::from_wire(&set.to_wire().unwrap()).unwrap();
        assert_eq!(decoded, set);
        assert!(decoded
            .validate(&group.roster, group.roster.full_filter(), &MESSAGE, &batch)
            .is_ok());
        assert!(InitSet::from_wire(b"{\"signer\":1}").is_err());
    }
}
