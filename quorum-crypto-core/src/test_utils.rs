//! Shared fixtures for unit tests.

use curve25519_dalek::Scalar;
use rand_core::OsRng;

use crate::adapter::{propose_clsag, propose_composition, ProofRequest};
use crate::filter::{SignerRoster, SignerSetFilter};
use crate::keys::{
    aggregate_partial_key_images, compute_partial_key_image, deal_accounts, generator_g,
    hash_to_point, point_to_bytes, MultisigAccount,
};
use crate::nonce::NonceVault;
use crate::proofs::RingMember;
use crate::types::SignerId;

pub(crate) struct TestGroup {
    pub roster: SignerRoster,
    pub accounts: Vec<MultisigAccount>,
    pub vaults: Vec<NonceVault>,
}

impl TestGroup {
    pub fn signer(&self, index: usize) -> SignerId {
        self.roster.signers()[index]
    }
}

pub(crate) fn test_group(n: u8, t: u32) -> TestGroup {
    let signers = (1..=n)
        .map(|i| SignerId::from_secret(&Scalar::from(u64::from(i))))
        .collect();
    let roster = SignerRoster::new(signers, t).unwrap();
    let accounts = deal_accounts(&roster, &Scalar::random(&mut OsRng), &mut OsRng).unwrap();
    let vaults = (0..n).map(|_| NonceVault::new()).collect();
    TestGroup {
        roster,
        accounts,
        vaults,
    }
}

pub(crate) fn composition_request(group: &TestGroup, message: [u8; 32]) -> ProofRequest {
    propose_composition(
        message,
        Scalar::random(&mut OsRng),
        Scalar::random(&mut OsRng),
        Scalar::random(&mut OsRng),
        &group.accounts[0].group_spend_key_u(),
        &mut OsRng,
    )
    .unwrap()
}

/// CLSAG over a ring of 4 with the group's key at index 2; the key image is
/// computed cooperatively by the first `T` signers.
pub(crate) fn clsag_request(group: &TestGroup, message: [u8; 32]) -> ProofRequest {
    let k_offset = Scalar::random(&mut OsRng);
    let mask = Scalar::random(&mut OsRng);
    let real_key = group.accounts[0].group_spend_key_g() + k_offset * generator_g();
    let pseudo = Scalar::random(&mut OsRng) * generator_g();
    let mut ring: Vec<RingMember> = (0..4)
        .map(|_| RingMember {
            key: point_to_bytes(&(Scalar::random(&mut OsRng) * generator_g())),
            commitment: point_to_bytes(&(Scalar::random(&mut OsRng) * generator_g())),
        })
        .collect();
    ring[2] = RingMember {
        key: point_to_bytes(&real_key),
        commitment: point_to_bytes(&(pseudo + mask * generator_g())),
    };

    let filter = (0..group.roster.threshold() as usize)
        .fold(SignerSetFilter::empty(), SignerSetFilter::with_index);
    let base = hash_to_point(&ring[2].key);
    let partial_images: Vec<[u8; 32]> = filter
        .indices()
        .map(|i| compute_partial_key_image(&group.accounts[i], filter, &base).unwrap())
        .collect();
    let key_image = aggregate_partial_key_images(&partial_images, &k_offset, &base).unwrap();

    propose_clsag(
        message,
        ring,
        point_to_bytes(&pseudo),
        2,
        point_to_bytes(&key_image),
        k_offset,
        mask,
        &mut OsRng,
    )
    .unwrap()
}
