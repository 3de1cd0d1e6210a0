//! In-process ceremony simulation.
//!
//! Plays every signer of a freshly dealt account in one process. Offline
//! signers never send anything; a Byzantine signer sends a replayed init set
//! and partial signature sets with corrupted responses. Honest signers must
//! still finish whenever `T` of them are online.

use anyhow::{Context, Result};
use curve25519_dalek::Scalar;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use quorum_crypto_core::keys::point_to_bytes;
use quorum_crypto_core::prelude::*;
use quorum_crypto_core::{
    aggregate_partial_key_images, compute_partial_key_image, deal_accounts, generator_g,
    hash_to_point, propose_clsag, propose_composition, RingMember,
};

use crate::config::SimulationConfig;

/// How one signer's ceremony ended.
#[derive(Debug, Clone)]
pub struct SignerOutcome {
    /// Roster position
    pub index: usize,
    /// Identity
    pub signer: SignerId,
    /// Whether this signer was the corrupting one
    pub byzantine: bool,
    /// Final state
    pub state: CeremonyState,
    /// Proofs assembled and verified
    pub verified_proofs: usize,
    /// Peer artifacts excluded
    pub rejected: usize,
    /// Abort reason
    pub failure: Option<CryptoError>,
}

/// Outcome of every online signer, in roster order.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Per-signer results
    pub outcomes: Vec<SignerOutcome>,
}

impl SimulationReport {
    /// Whether every honest online signer completed.
    #[must_use]
    pub fn honest_complete(&self) -> bool {
        self.outcomes
            .iter()
            .filter(|o| !o.byzantine)
            .all(|o| o.state == CeremonyState::Complete)
    }
}

/// Deal an account, build a batch and run one ceremony across all online
/// signers.
///
/// # Errors
///
/// Setup failures (dealing, proposals) and local ceremony faults. An
/// aborted ceremony is an outcome, not an error.
pub fn run<R: RngCore + CryptoRng>(
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<SimulationReport> {
    let signers = (0..config.signers)
        .map(|_| SignerId::from_secret(&Scalar::random(rng)))
        .collect();
    let roster =
        SignerRoster::new(signers, config.threshold).context("Failed to build signer roster")?;
    let accounts = deal_accounts(&roster, &Scalar::random(rng), rng)
        .context("Failed to deal key shares")?;
    let vaults: Vec<NonceVault> = accounts.iter().map(|_| NonceVault::new()).collect();

    let mut message = [0u8; 32];
    rng.fill_bytes(&mut message);
    let batch = match config.proof_kind {
        ProofKind::Composition => composition_batch(&accounts, message, config.batch_size, rng)?,
        ProofKind::Clsag => clsag_batch(&accounts, message, config, rng)?,
    };

    info!(
        threshold = config.threshold,
        signers = config.signers,
        kind = %config.proof_kind,
        proofs = batch.len(),
        offline = ?config.offline,
        byzantine = ?config.byzantine,
        "Starting simulated ceremony"
    );

    let online: Vec<usize> = (0..accounts.len())
        .filter(|i| !config.offline.contains(i))
        .collect();
    let mut ceremonies = online
        .iter()
        .map(|&i| {
            Ceremony::new(
                &accounts[i],
                &vaults[i],
                roster.full_filter(),
                message,
                batch.clone(),
            )
        })
        .collect::<CryptoResult<Vec<_>>>()
        .context("Failed to set up ceremonies")?;

    // Round 1
    let mut outbox: Vec<(usize, InitSet)> = Vec::new();
    for (ceremony, &index) in ceremonies.iter_mut().zip(&online) {
        let set = ceremony.start(rng).context("Failed to start ceremony")?.clone();
        if config.byzantine == Some(index) {
            outbox.push((index, set.clone()));
        }
        outbox.push((index, set));
    }
    for (ceremony, &index) in ceremonies.iter_mut().zip(&online) {
        for (from, set) in &outbox {
            if *from != index {
                ceremony.receive_init_set(set.clone())?;
            }
        }
        debug!(index, available = %ceremony.available_signers(), "Round 1 delivered");
    }

    // Round 2
    let mut outbox: Vec<(usize, PartialSigSet)> = Vec::new();
    for (ceremony, &index) in ceremonies.iter_mut().zip(&online) {
        let sets = ceremony
            .begin_partial_signing()
            .context("Failed to sign partial signature sets")?
            .to_vec();
        for mut set in sets {
            if config.byzantine == Some(index) {
                corrupt(&mut set, rng);
            }
            outbox.push((index, set));
        }
    }
    for (ceremony, &index) in ceremonies.iter_mut().zip(&online) {
        for (from, set) in &outbox {
            if *from != index {
                ceremony.receive_partial_sig_set(set.clone())?;
            }
        }
        debug!(index, covered = ceremony.fully_covered_filters().len(), "Round 2 delivered");
    }

    let mut outcomes = Vec::with_capacity(ceremonies.len());
    for (ceremony, &index) in ceremonies.iter_mut().zip(&online) {
        let verified_proofs = match ceremony.aggregate() {
            Ok(proofs) => proofs.iter().filter(|p| p.verify()).count(),
            Err(error) => {
                warn!(index, error = %error, "Ceremony did not complete");
                0
            }
        };
        outcomes.push(SignerOutcome {
            index,
            signer: *ceremony.local_signer(),
            byzantine: config.byzantine == Some(index),
            state: ceremony.state(),
            verified_proofs,
            rejected: ceremony.rejected().len(),
            failure: ceremony.failure().cloned(),
        });
    }

    Ok(SimulationReport { outcomes })
}

fn corrupt<R: RngCore + CryptoRng>(set: &mut PartialSigSet, rng: &mut R) {
    for partial in &mut set.partials {
        let garbage = Scalar::random(rng).to_bytes();
        match partial {
            PartialSignature::Composition(p) => p.r_ki_partial = garbage,
            PartialSignature::Clsag(p) => p.s_partial = garbage,
        }
    }
}

fn composition_batch<R: RngCore + CryptoRng>(
    accounts: &[MultisigAccount],
    message: [u8; 32],
    size: usize,
    rng: &mut R,
) -> Result<Vec<ProofRequest>> {
    let group_key_u = accounts
        .first()
        .context("Account has no signers")?
        .group_spend_key_u();
    (0..size)
        .map(|_| {
            let (x, y, z) = (Scalar::random(rng), Scalar::random(rng), Scalar::random(rng));
            propose_composition(message, x, y, z, &group_key_u, rng)
                .context("Failed to propose composition proof")
        })
        .collect()
}

/// Each input spends the group key (plus a random offset) hidden at a random
/// ring position. Key images are computed by the first `T` signers, as a
/// wallet does when it first sees the output.
fn clsag_batch<R: RngCore + CryptoRng>(
    accounts: &[MultisigAccount],
    message: [u8; 32],
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<Vec<ProofRequest>> {
    let first = accounts.first().context("Account has no signers")?;
    let key_image_signers = (0..config.threshold as usize)
        .fold(SignerSetFilter::empty(), SignerSetFilter::with_index);

    let mut batch = Vec::with_capacity(config.batch_size);
    for _ in 0..config.batch_size {
        let k_offset = Scalar::random(rng);
        let mask = Scalar::random(rng);
        let pseudo_out = Scalar::random(rng) * generator_g();
        let real_key = first.group_spend_key_g() + k_offset * generator_g();
        let real_index = (rng.next_u64() % config.ring_size as u64) as usize;

        let mut ring = Vec::with_capacity(config.ring_size);
        for _ in 0..config.ring_size {
            ring.push(RingMember {
                key: point_to_bytes(&(Scalar::random(rng) * generator_g())),
                commitment: point_to_bytes(&(Scalar::random(rng) * generator_g())),
            });
        }
        ring[real_index] = RingMember {
            key: point_to_bytes(&real_key),
            commitment: point_to_bytes(&(pseudo_out + mask * generator_g())),
        };

        let base = hash_to_point(&ring[real_index].key);
        let partial_images = key_image_signers
            .indices()
            .map(|i| compute_partial_key_image(&accounts[i], key_image_signers, &base))
            .collect::<CryptoResult<Vec<_>>>()
            .context("Failed to compute partial key images")?;
        let key_image = aggregate_partial_key_images(&partial_images, &k_offset, &base)
            .context("Failed to aggregate key image")?;

        batch.push(
            propose_clsag(
                message,
                ring,
                point_to_bytes(&pseudo_out),
                real_index,
                point_to_bytes(&key_image),
                k_offset,
                mask,
                rng,
            )
            .context("Failed to propose CLSAG")?,
        );
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn test_default_run_completes() {
        let report = run(&SimulationConfig::default(), &mut OsRng).unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.honest_complete());
        assert!(report.outcomes.iter().all(|o| o.verified_proofs == 2));
    }

    #[test]
    fn test_clsag_with_offline_signer() {
        let config = SimulationConfig {
            proof_kind: ProofKind::Clsag,
            ring_size: 4,
            batch_size: 1,
            offline: vec![1],
            ..SimulationConfig::default()
        };
        let report = run(&config, &mut OsRng).unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.honest_complete());
    }

    #[test]
    fn test_too_many_offline_aborts() {
        let config = SimulationConfig {
            offline: vec![0, 2],
            ..SimulationConfig::default()
        };
        let report = run(&config, &mut OsRng).unwrap();
        assert!(!report.honest_complete());
        assert!(matches!(
            report.outcomes[0].failure,
            Some(CryptoError::InsufficientSigners { .. })
        ));
    }

    #[test]
    fn test_byzantine_signer_is_routed_around() {
        let config = SimulationConfig {
            signers: 4,
            byzantine: Some(0),
            ..SimulationConfig::default()
        };
        let report = run(&config, &mut OsRng).unwrap();
        assert!(report.honest_complete());
        // The replayed init set is rejected by every honest signer.
        assert!(report
            .outcomes
            .iter()
            .filter(|o| !o.byzantine)
            .all(|o| o.rejected >= 1 && o.verified_proofs == 2));
    }
}
