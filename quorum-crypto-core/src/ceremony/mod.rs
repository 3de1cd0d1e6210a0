//! Ceremony orchestration.
//!
//! A [`Ceremony`] drives one signer through both rounds for one batch of
//! proofs:
//!
//! 1. [`start`](Ceremony::start) builds the local [`InitSet`] to broadcast.
//! 2. Peer init sets are fed through
//!    [`receive_init_set`](Ceremony::receive_init_set).
//! 3. [`begin_partial_signing`](Ceremony::begin_partial_signing) signs every
//!    permutation filter whose members all sent an init set.
//! 4. Peer partial signature sets are fed through
//!    [`receive_partial_sig_set`](Ceremony::receive_partial_sig_set).
//! 5. [`aggregate`](Ceremony::aggregate) assembles the proofs from the first
//!    fully covered filter that verifies.
//!
//! Peer artifacts that fail validation are recorded and skipped; they never
//! abort the ceremony. The ceremony never talks to the network: the caller
//! moves artifacts between signers.

mod state;

pub use state::CeremonyState;

use core::fmt;

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use crate::adapter::{finalize, validate_batch, CompletedProof, ProofKind, ProofRequest};
use crate::filter::{SignerRoster, SignerSetFilter};
use crate::init_set::{InitSet, InitSetCollection};
use crate::keys::KeyShareProvider;
use crate::nonce::{NonceRecordKey, NonceVault};
use crate::partial_sig_set::{
    build_partial_sig_sets, FilterFailure, PartialSigSet, PartialSigSetCollection,
};
use crate::types::errors::{CryptoError, CryptoResult};
use crate::types::sanitize::sanitize_hex;
use crate::types::{ArtifactKind, RejectedArtifact, SignerId};

const ACTIVE: [CeremonyState; 4] = [
    CeremonyState::Proposed,
    CeremonyState::InitCollecting,
    CeremonyState::PartialSigning,
    CeremonyState::Aggregating,
];

/// One signer's side of a partial-signature ceremony.
pub struct Ceremony<'a, P: KeyShareProvider + ?Sized> {
    account: &'a P,
    vault: &'a NonceVault,
    aggregate: SignerSetFilter,
    message: [u8; 32],
    batch: Vec<ProofRequest>,
    kind: ProofKind,
    state: CeremonyState,
    local_init_set: Option<InitSet>,
    init_sets: Option<InitSetCollection>,
    local_partial_sets: Vec<PartialSigSet>,
    partial_sets: PartialSigSetCollection,
    filter_failures: Vec<FilterFailure>,
    assembly_failures: Vec<FilterFailure>,
    rejected: Vec<RejectedArtifact>,
    completed: Vec<CompletedProof>,
    failure: Option<CryptoError>,
}

impl<'a, P: KeyShareProvider + ?Sized> Ceremony<'a, P> {
    /// Set up a ceremony in [`CeremonyState::Proposed`].
    ///
    /// # Errors
    ///
    /// - `InvalidFilter` for an invalid aggregate filter
    /// - `InvalidSigner` if the local signer is not invited by `aggregate`
    /// - `InvalidProposal` for an empty, mixed or inconsistent batch
    pub fn new(
        account: &'a P,
        vault: &'a NonceVault,
        aggregate: SignerSetFilter,
        message: [u8; 32],
        batch: Vec<ProofRequest>,
    ) -> CryptoResult<Self> {
        let roster = account.roster();
        roster.validate_aggregate_filter(aggregate)?;
        let local_signer = account.local_signer();
        if !roster.is_member(local_signer, aggregate) {
            return Err(CryptoError::InvalidSigner {
                signer: local_signer.short(),
                reason: format!("not invited by aggregate filter {aggregate}"),
            });
        }
        let kind = validate_batch(&message, &batch)?;

        info!(
            signer = %local_signer,
            aggregate = %aggregate,
            message = %sanitize_hex(&message),
            kind = %kind,
            proofs = batch.len(),
            "Ceremony proposed"
        );

        Ok(Self {
            account,
            vault,
            aggregate,
            message,
            batch,
            kind,
            state: CeremonyState::Proposed,
            local_init_set: None,
            init_sets: None,
            local_partial_sets: Vec::new(),
            partial_sets: PartialSigSetCollection::new(),
            filter_failures: Vec::new(),
            assembly_failures: Vec::new(),
            rejected: Vec::new(),
            completed: Vec::new(),
            failure: None,
        })
    }

    /// Build the local initialization set and start collecting peers' sets.
    ///
    /// # Errors
    ///
    /// `InvalidCeremonyState` unless `Proposed`.
    pub fn start<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> CryptoResult<&InitSet> {
        self.state.require(&[CeremonyState::Proposed])?;

        let local_set = InitSet::build(
            self.account.roster(),
            self.account.local_signer(),
            self.aggregate,
            &self.message,
            &self.batch,
            self.vault,
            rng,
        )?;
        self.init_sets = Some(InitSetCollection::new(local_set.clone()));
        self.state = CeremonyState::InitCollecting;

        info!(
            message = %sanitize_hex(&self.message),
            proofs = self.batch.len(),
            "Ceremony started, collecting initialization sets"
        );
        Ok(self.local_init_set.insert(local_set))
    }

    /// Offer a peer's initialization set.
    ///
    /// Returns whether the set was accepted. Rejected sets are recorded in
    /// [`rejected`](Self::rejected); an exact echo of the local set is
    /// ignored.
    ///
    /// # Errors
    ///
    /// `InvalidCeremonyState` unless `InitCollecting`.
    pub fn receive_init_set(&mut self, set: InitSet) -> CryptoResult<bool> {
        self.state.require(&[CeremonyState::InitCollecting])?;
        if self.local_init_set.as_ref() == Some(&set) {
            debug!("Ignored echo of the local initialization set");
            return Ok(false);
        }
        let collection = self.init_sets.as_mut().ok_or_else(|| {
            CryptoError::InternalError("collecting without a local initialization set".into())
        })?;

        let signer = set.signer;
        match collection.offer(
            set,
            self.account.roster(),
            self.aggregate,
            &self.message,
            &self.batch,
        ) {
            Ok(()) => {
                debug!(signer = %signer, "Accepted initialization set");
                Ok(true)
            }
            Err(rejection) => {
                warn!(%rejection, "Rejected initialization set");
                self.rejected.push(rejection);
                Ok(false)
            }
        }
    }

    /// Signers with an accepted initialization set, the local signer
    /// included once started.
    #[must_use]
    pub fn available_signers(&self) -> SignerSetFilter {
        self.init_sets
            .as_ref()
            .map_or(SignerSetFilter::empty(), |c| c.available(self.account.roster()))
    }

    /// Sign every filter whose members are all available and return the
    /// local partial signature sets to broadcast.
    ///
    /// Filters the local signer could not sign are listed in
    /// [`filter_failures`](Self::filter_failures). With fewer than `T`
    /// available signers nothing is signed and [`aggregate`](Self::aggregate)
    /// will end the ceremony.
    ///
    /// # Errors
    ///
    /// `InvalidCeremonyState` unless `InitCollecting`.
    pub fn begin_partial_signing(&mut self) -> CryptoResult<&[PartialSigSet]> {
        self.state.require(&[CeremonyState::InitCollecting])?;
        let available = self.available_signers();
        let init_sets = self.init_sets.as_ref().map_or(&[][..], InitSetCollection::sets);

        let build = build_partial_sig_sets(
            self.account,
            &self.batch,
            self.aggregate,
            &self.message,
            available,
            init_sets,
            self.vault,
        )?;

        for set in &build.sets {
            self.partial_sets.insert_local(set.clone());
        }
        self.local_partial_sets = build.sets;
        self.filter_failures = build.failures;
        self.state = CeremonyState::PartialSigning;

        info!(
            available = %available,
            signed = self.local_partial_sets.len(),
            failed = self.filter_failures.len(),
            "Partial signing complete"
        );
        Ok(&self.local_partial_sets)
    }

    /// Offer a peer's partial signature set.
    ///
    /// Returns whether the set was accepted. Sets for filters containing a
    /// signer without an accepted initialization set are rejected, as is
    /// anything failing [`PartialSigSet::validate`]. Echoes of the local
    /// sets are ignored.
    ///
    /// # Errors
    ///
    /// `InvalidCeremonyState` unless `PartialSigning`.
    pub fn receive_partial_sig_set(&mut self, set: PartialSigSet) -> CryptoResult<bool> {
        self.state.require(&[CeremonyState::PartialSigning])?;
        if self.local_partial_sets.contains(&set) {
            debug!(filter = %set.filter, "Ignored echo of a local partial signature set");
            return Ok(false);
        }

        if !set.filter.is_subset_of(self.available_signers()) {
            let rejection = RejectedArtifact {
                signer: set.signer,
                filter: set.filter,
                artifact: ArtifactKind::PartialSigSet,
                error: CryptoError::BadPartialSigSet {
                    signer: set.signer.short(),
                    filter: set.filter,
                    detail: "filter includes a signer without an accepted initialization set"
                        .into(),
                },
            };
            warn!(%rejection, "Rejected partial signature set");
            self.rejected.push(rejection);
            return Ok(false);
        }

        let (signer, filter) = (set.signer, set.filter);
        match self.partial_sets.offer(
            set,
            self.account.local_signer(),
            self.account.roster(),
            self.aggregate,
            &self.message,
            &self.batch,
        ) {
            Ok(()) => {
                debug!(signer = %signer, filter = %filter, "Accepted partial signature set");
                Ok(true)
            }
            Err(rejection) => {
                warn!(%rejection, "Rejected partial signature set");
                self.rejected.push(rejection);
                Ok(false)
            }
        }
    }

    /// Filters with an accepted set from each of their `T` signers, in
    /// canonical order.
    #[must_use]
    pub fn fully_covered_filters(&self) -> Vec<SignerSetFilter> {
        let threshold = self.account.roster().threshold();
        self.account
            .roster()
            .permutation_filters(self.aggregate)
            .into_iter()
            .flatten()
            .filter(|&f| self.partial_sets.coverage(f) == threshold)
            .collect()
    }

    /// Assemble the batch from the first fully covered filter whose partial
    /// signatures finalize for every proof.
    ///
    /// Ends in `Complete` on success. Otherwise ends in `Aborted` and returns
    /// `InsufficientSigners` if no filter was fully covered, or
    /// `AssemblyFailed` naming the filters if every covered filter failed.
    /// Either way the ceremony's remaining nonce records are discarded.
    /// Filters that did not assemble are listed in
    /// [`assembly_failures`](Self::assembly_failures).
    ///
    /// # Errors
    ///
    /// `InvalidCeremonyState` unless `PartialSigning`, or the abort reason.
    pub fn aggregate(&mut self) -> CryptoResult<&[CompletedProof]> {
        self.state.require(&[CeremonyState::PartialSigning])?;
        self.state = CeremonyState::Aggregating;

        let covered = self.fully_covered_filters();
        if covered.is_empty() {
            let best = self
                .account
                .roster()
                .permutation_filters(self.aggregate)
                .into_iter()
                .flatten()
                .map(|f| self.partial_sets.coverage(f))
                .max()
                .unwrap_or(0);
            return Err(self.fail(CryptoError::InsufficientSigners {
                threshold: self.account.roster().threshold(),
                covered: best,
            }));
        }

        for filter in covered {
            match self.assemble(filter) {
                Ok(proofs) => {
                    self.completed = proofs;
                    self.state = CeremonyState::Complete;
                    let discarded = self.discard_nonces();
                    info!(
                        filter = %filter,
                        message = %sanitize_hex(&self.message),
                        proofs = self.completed.len(),
                        discarded,
                        "Ceremony complete"
                    );
                    return Ok(&self.completed);
                }
                Err((proof_key, error)) => {
                    let signers = self
                        .account
                        .roster()
                        .signers_in(filter)
                        .iter()
                        .map(SignerId::short)
                        .collect::<Vec<_>>()
                        .join(", ");
                    let failed_proof = proof_key.as_ref().map(sanitize_hex).unwrap_or_default();
                    warn!(
                        filter = %filter,
                        signers = %signers,
                        proof_key = %failed_proof,
                        error = %error,
                        "Filter failed to assemble"
                    );
                    self.assembly_failures.push(FilterFailure {
                        filter,
                        proof_key,
                        error,
                    });
                }
            }
        }

        let filters = self
            .assembly_failures
            .iter()
            .map(|f| f.filter.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let detail = self
            .assembly_failures
            .last()
            .map_or_else(String::new, |f| f.error.to_string());
        Err(self.fail(CryptoError::AssemblyFailed(format!(
            "no fully covered filter assembled (failed: {filters}): {detail}"
        ))))
    }

    fn assemble(
        &self,
        filter: SignerSetFilter,
    ) -> Result<Vec<CompletedProof>, (Option<[u8; 32]>, CryptoError)> {
        let sets = self.partial_sets.for_filter(self.account.roster(), filter);
        self.batch
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let proof_key = *request.proposal.proof_key();
                sets.iter()
                    .map(|set| {
                        set.partials.get(index).cloned().ok_or_else(|| {
                            CryptoError::AssemblyFailed(format!(
                                "set from {} has no partial for proof {index}",
                                set.signer
                            ))
                        })
                    })
                    .collect::<CryptoResult<Vec<_>>>()
                    .and_then(|partials| finalize(&request.proposal, &partials))
                    .map_err(|e| (Some(proof_key), e))
            })
            .collect()
    }

    /// Give up on the ceremony and discard its nonce records.
    ///
    /// # Errors
    ///
    /// `InvalidCeremonyState` if already `Complete` or `Aborted`.
    pub fn abort(&mut self) -> CryptoResult<()> {
        self.state.require(&ACTIVE)?;
        let from = self.state;
        self.state = CeremonyState::Aborted;
        let discarded = self.discard_nonces();
        info!(from = %from, discarded, "Ceremony aborted");
        Ok(())
    }

    fn fail(&mut self, error: CryptoError) -> CryptoError {
        self.state = CeremonyState::Aborted;
        let discarded = self.discard_nonces();
        warn!(error = %error, discarded, "Ceremony aborted");
        self.failure = Some(error.clone());
        error
    }

    /// Remove this ceremony's unconsumed records from the vault. Records of
    /// other ceremonies over the same message are left alone.
    fn discard_nonces(&self) -> usize {
        let roster = self.account.roster();
        let filters: Vec<SignerSetFilter> = roster
            .permutations_containing(self.account.local_signer(), self.aggregate)
            .into_iter()
            .flatten()
            .collect();

        let mut discarded = 0usize;
        for request in &self.batch {
            for filter in &filters {
                let key = NonceRecordKey::new(self.message, *request.proposal.proof_key(), *filter);
                if self.vault.remove(&key) {
                    discarded += 1;
                }
            }
        }
        discarded
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CeremonyState {
        self.state
    }

    /// Identity of the local signer.
    #[must_use]
    pub fn local_signer(&self) -> &SignerId {
        self.account.local_signer()
    }

    /// The account's roster.
    #[must_use]
    pub fn roster(&self) -> &SignerRoster {
        self.account.roster()
    }

    /// Message every proof signs.
    #[must_use]
    pub fn message(&self) -> &[u8; 32] {
        &self.message
    }

    /// Signers invited into the ceremony.
    #[must_use]
    pub fn aggregate_filter(&self) -> SignerSetFilter {
        self.aggregate
    }

    /// Proof family of the batch.
    #[must_use]
    pub fn kind(&self) -> ProofKind {
        self.kind
    }

    /// Local initialization set, once started.
    #[must_use]
    pub fn local_init_set(&self) -> Option<&InitSet> {
        self.local_init_set.as_ref()
    }

    /// Local partial signature sets, once signed.
    #[must_use]
    pub fn local_partial_sig_sets(&self) -> &[PartialSigSet] {
        &self.local_partial_sets
    }

    /// Filters the local signer attempted but could not sign.
    #[must_use]
    pub fn filter_failures(&self) -> &[FilterFailure] {
        &self.filter_failures
    }

    /// Fully covered filters whose partial signatures did not assemble into
    /// verifying proofs, in the order they were tried.
    #[must_use]
    pub fn assembly_failures(&self) -> &[FilterFailure] {
        &self.assembly_failures
    }

    /// Peer artifacts excluded so far.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedArtifact] {
        &self.rejected
    }

    /// Assembled proofs, in batch order; empty unless `Complete`.
    #[must_use]
    pub fn completed_proofs(&self) -> &[CompletedProof] {
        &self.completed
    }

    /// Why the ceremony aborted, if it aborted on its own.
    #[must_use]
    pub fn failure(&self) -> Option<&CryptoError> {
        self.failure.as_ref()
    }
}

impl<P: KeyShareProvider + ?Sized> fmt::Debug for Ceremony<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ceremony")
            .field("signer", self.account.local_signer())
            .field("aggregate", &self.aggregate)
            .field("message", &sanitize_hex(&self.message))
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("proofs", &self.batch.len())
            .field("rejected", &self.rejected.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::PartialSignature;
    use crate::keys::MultisigAccount;
    use crate::test_utils::{clsag_request, composition_request, test_group, TestGroup};
    use curve25519_dalek::Scalar;
    use rand_core::OsRng;

    const MESSAGE: [u8; 32] = [0x5a; 32];

    fn ceremonies<'g>(
        group: &'g TestGroup,
        batch: &[ProofRequest],
        online: &[usize],
    ) -> Vec<Ceremony<'g, MultisigAccount>> {
        online
            .iter()
            .map(|&i| {
                Ceremony::new(
                    &group.accounts[i],
                    &group.vaults[i],
                    group.roster.full_filter(),
                    MESSAGE,
                    batch.to_vec(),
                )
                .unwrap()
            })
            .collect()
    }

    fn exchange_init_sets(ceremonies: &mut [Ceremony<'_, MultisigAccount>]) {
        let sets: Vec<InitSet> = ceremonies
            .iter_mut()
            .map(|c| c.start(&mut OsRng).unwrap().clone())
            .collect();
        for ceremony in ceremonies.iter_mut() {
            for set in &sets {
                if &set.signer != ceremony.local_signer() {
                    assert!(ceremony.receive_init_set(set.clone()).unwrap());
                }
            }
        }
    }

    fn sign_and_exchange(ceremonies: &mut [Ceremony<'_, MultisigAccount>]) -> Vec<PartialSigSet> {
        let sets: Vec<PartialSigSet> = ceremonies
            .iter_mut()
            .flat_map(|c| c.begin_partial_signing().unwrap().to_vec())
            .collect();
        for ceremony in ceremonies.iter_mut() {
            for set in &sets {
                if &set.signer != ceremony.local_signer() {
                    ceremony.receive_partial_sig_set(set.clone()).unwrap();
                }
            }
        }
        sets
    }

    #[test]
    fn test_all_signers_complete() {
        let group = test_group(3, 2);
        let batch = vec![
            composition_request(&group, MESSAGE),
            composition_request(&group, MESSAGE),
        ];
        let mut cs = ceremonies(&group, &batch, &[0, 1, 2]);
        exchange_init_sets(&mut cs);
        assert_eq!(cs[0].available_signers(), group.roster.full_filter());
        sign_and_exchange(&mut cs);

        for ceremony in &mut cs {
            assert_eq!(ceremony.fully_covered_filters().len(), 3);
            let proofs = ceremony.aggregate().unwrap();
            assert_eq!(proofs.len(), 2);
            assert!(proofs.iter().all(CompletedProof::verify));
            assert_eq!(ceremony.state(), CeremonyState::Complete);
            assert!(ceremony.rejected().is_empty());
        }
        assert!(group.vaults.iter().all(NonceVault::is_empty));
    }

    #[test]
    fn test_second_signer_silent() {
        // Roster index 1 never sends anything.
        let group = test_group(3, 2);
        let batch = vec![clsag_request(&group, MESSAGE)];
        let mut cs = ceremonies(&group, &batch, &[0, 2]);
        exchange_init_sets(&mut cs);
        let sets = sign_and_exchange(&mut cs);

        let only = SignerSetFilter::from_bits(0b101);
        assert!(sets.iter().all(|s| s.filter == only));
        assert_eq!(cs[0].fully_covered_filters(), vec![only]);
        assert!(cs[0].aggregate().unwrap()[0].verify());
    }

    #[test]
    fn test_insufficient_signers_aborts() {
        let group = test_group(2, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut cs = ceremonies(&group, &batch, &[0]);
        cs[0].start(&mut OsRng).unwrap();
        assert!(cs[0].begin_partial_signing().unwrap().is_empty());

        let err = cs[0].aggregate().unwrap_err();
        assert_eq!(
            err,
            CryptoError::InsufficientSigners {
                threshold: 2,
                covered: 0
            }
        );
        assert_eq!(cs[0].state(), CeremonyState::Aborted);
        assert_eq!(cs[0].failure(), Some(&err));
        assert!(group.vaults[0].is_empty());
    }

    #[test]
    fn test_tampered_filter_is_skipped() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut cs = ceremonies(&group, &batch, &[0, 1, 2]);
        exchange_init_sets(&mut cs);

        let mut sets: Vec<PartialSigSet> = cs
            .iter_mut()
            .flat_map(|c| c.begin_partial_signing().unwrap().to_vec())
            .collect();
        // Signer 1 corrupts its share for the first filter.
        let first = SignerSetFilter::from_bits(0b011);
        for set in &mut sets {
            if set.signer == group.signer(1) && set.filter == first {
                if let PartialSignature::Composition(p) = &mut set.partials[0] {
                    p.r_ki_partial = Scalar::from(7u64).to_bytes();
                }
            }
        }
        for set in sets.into_iter().filter(|s| s.signer != group.signer(0)) {
            cs[0].receive_partial_sig_set(set).unwrap();
        }

        let proofs = cs[0].aggregate().unwrap();
        assert!(proofs[0].verify());
        assert_eq!(cs[0].state(), CeremonyState::Complete);

        let failures = cs[0].assembly_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].filter, first);
        assert_eq!(failures[0].proof_key, Some(*batch[0].proposal.proof_key()));
        assert!(matches!(failures[0].error, CryptoError::AssemblyFailed(_)));
        assert!(cs[0].rejected().is_empty());
    }

    #[test]
    fn test_assembly_failure_names_filter() {
        let group = test_group(2, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut cs = ceremonies(&group, &batch, &[0, 1]);
        exchange_init_sets(&mut cs);

        cs[0].begin_partial_signing().unwrap();
        let mut peer_set = cs[1].begin_partial_signing().unwrap()[0].clone();
        if let PartialSignature::Composition(p) = &mut peer_set.partials[0] {
            p.r_ki_partial = Scalar::from(3u64).to_bytes();
        }
        assert!(cs[0].receive_partial_sig_set(peer_set).unwrap());

        let err = cs[0].aggregate().unwrap_err();
        match &err {
            CryptoError::AssemblyFailed(detail) => assert!(detail.contains("0b11"), "{detail}"),
            other => panic!("expected AssemblyFailed, got {other:?}"),
        }
        assert_eq!(cs[0].state(), CeremonyState::Aborted);
        assert_eq!(cs[0].failure(), Some(&err));
        assert_eq!(cs[0].assembly_failures().len(), 1);
        assert_eq!(cs[0].assembly_failures()[0].filter, SignerSetFilter::from_bits(0b11));
    }

    #[test]
    fn test_echoed_local_sets_are_ignored() {
        let group = test_group(2, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut cs = ceremonies(&group, &batch, &[0, 1]);
        exchange_init_sets(&mut cs);

        let own_init = cs[0].local_init_set().cloned().unwrap();
        assert!(!cs[0].receive_init_set(own_init).unwrap());

        let own_partial = cs[0].begin_partial_signing().unwrap()[0].clone();
        assert!(!cs[0].receive_partial_sig_set(own_partial).unwrap());
        assert!(cs[0].rejected().is_empty());

        // A forged set under the local identity is still rejected.
        let mut forged = cs[1].begin_partial_signing().unwrap()[0].clone();
        forged.signer = group.signer(0);
        assert!(!cs[0].receive_partial_sig_set(forged).unwrap());
        assert_eq!(cs[0].rejected().len(), 1);
    }

    #[test]
    fn test_rejects_partial_set_from_signer_without_init_set() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut all = ceremonies(&group, &batch, &[0, 1, 2]);
        exchange_init_sets(&mut all);
        let from_two: Vec<PartialSigSet> = all[2].begin_partial_signing().unwrap().to_vec();

        // Signer 0 never heard from signer 2.
        let mut cs = ceremonies(&group, &batch, &[0, 1]);
        exchange_init_sets(&mut cs);
        cs[0].begin_partial_signing().unwrap();
        for set in from_two {
            assert!(!cs[0].receive_partial_sig_set(set).unwrap());
        }
        assert_eq!(cs[0].rejected().len(), 2);
        assert!(cs[0]
            .rejected()
            .iter()
            .all(|r| r.artifact == ArtifactKind::PartialSigSet));
    }

    #[test]
    fn test_state_guards() {
        let group = test_group(2, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let mut cs = ceremonies(&group, &batch, &[0]);
        let ceremony = &mut cs[0];

        assert!(matches!(
            ceremony.begin_partial_signing(),
            Err(CryptoError::InvalidCeremonyState { .. })
        ));
        ceremony.start(&mut OsRng).unwrap();
        assert!(matches!(
            ceremony.start(&mut OsRng),
            Err(CryptoError::InvalidCeremonyState { .. })
        ));
        assert!(matches!(
            ceremony.aggregate(),
            Err(CryptoError::InvalidCeremonyState { .. })
        ));

        ceremony.abort().unwrap();
        assert_eq!(ceremony.state(), CeremonyState::Aborted);
        assert!(group.vaults[0].is_empty());
        assert!(ceremony.failure().is_none());
        assert!(matches!(
            ceremony.abort(),
            Err(CryptoError::InvalidCeremonyState { .. })
        ));
    }

    #[test]
    fn test_abort_keeps_other_ceremony_records() {
        let group = test_group(2, 2);
        let first = vec![composition_request(&group, MESSAGE)];
        let second = vec![composition_request(&group, MESSAGE)];
        let mut a = ceremonies(&group, &first, &[0]);
        let mut b = ceremonies(&group, &second, &[0]);
        a[0].start(&mut OsRng).unwrap();
        b[0].start(&mut OsRng).unwrap();
        assert_eq!(group.vaults[0].len(), 2);

        a[0].abort().unwrap();
        assert_eq!(group.vaults[0].len(), 1);
    }

    #[test]
    fn test_new_rejects_uninvited_signer() {
        let group = test_group(3, 2);
        let batch = vec![composition_request(&group, MESSAGE)];
        let result = Ceremony::new(
            &group.accounts[2],
            &group.vaults[2],
            SignerSetFilter::from_bits(0b011),
            MESSAGE,
            batch,
        );
        assert!(matches!(result, Err(CryptoError::InvalidSigner { .. })));
    }
}
