//! # quorum-crypto-core
//!
//! Threshold partial-signature ceremonies for confidential-transaction inputs.
//!
//! A fixed group of `N` keyholders, any `T` of whom may spend, jointly
//! produce the per-input proofs needed to spend an encumbered output without
//! anyone reconstructing the spend key:
//!
//! - **Composition proofs**: ownership and key-image linkability for
//!   `K = x*G + y*X + z*U`
//! - **CLSAG ring signatures**: ring membership with an auxiliary commitment
//!   key image
//!
//! ## Protocol
//!
//! Every `T`-subset (*permutation filter*) of the invited signers is signed
//! for independently, so the ceremony completes as long as any `T` invited
//! signers stay online. Each ceremony runs two broadcast rounds:
//!
//! 1. **Initialization sets**: MuSig2-style nonce commitments for every
//!    (proof, filter) pair the signer belongs to
//! 2. **Partial signature sets**: one partial signature per proof for every
//!    filter whose members all committed
//!
//! Any filter with a partial set from each of its `T` members yields the
//! finished proofs.
//!
//! ## Modules
//!
//! - [`types`]: Error taxonomy, signer identities, serde helpers
//! - [`filter`]: Signer-set bitsets, rosters and permutation enumeration
//! - [`keys`]: Generators, Shamir shares, Lagrange weights, key images
//! - [`nonce`]: Binonce commitments and the single-use nonce vault
//! - [`proofs`]: Single-party composition proofs and CLSAG
//! - [`adapter`]: Per-family multisig signing and assembly
//! - [`init_set`]: Round 1 artifacts
//! - [`partial_sig_set`]: Round 2 artifacts
//! - [`ceremony`]: The state machine tying the rounds together
//!
//! ## Example
//!
//! ```rust,ignore
//! use quorum_crypto_core::prelude::*;
//!
//! let mut ceremony = Ceremony::new(&account, &vault, aggregate, message, batch)?;
//! let init_set = ceremony.start(&mut OsRng)?.clone();
//! // ... broadcast init_set, feed peers' sets to receive_init_set ...
//! let partial_sets = ceremony.begin_partial_signing()?.to_vec();
//! // ... broadcast partial_sets, feed peers' sets to receive_partial_sig_set ...
//! let proofs = ceremony.aggregate()?;
//! ```
//!
//! ## Security Considerations
//!
//! - Secret nonces leave the vault only through a destructive `consume`
//! - Key shares and nonces are zeroized on drop
//! - Errors and logs carry hex prefixes of public values only

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(non_snake_case)]

extern crate alloc;

pub mod adapter;
pub mod ceremony;
pub mod filter;
pub mod init_set;
pub mod keys;
pub mod nonce;
pub mod partial_sig_set;
pub mod proofs;
pub mod types;

#[cfg(test)]
mod test_utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{
        CompletedProof, PartialSignature, ProofKind, ProofProposal, ProofRequest, ProofSecrets,
    };
    pub use crate::ceremony::{Ceremony, CeremonyState};
    pub use crate::filter::{SignerRoster, SignerSetFilter};
    pub use crate::init_set::InitSet;
    pub use crate::keys::{KeyShareProvider, MultisigAccount};
    pub use crate::nonce::NonceVault;
    pub use crate::partial_sig_set::PartialSigSet;
    pub use crate::types::errors::*;
    pub use crate::types::*;
}

/// Re-export commonly used types at crate root
pub use types::errors::{CryptoError, CryptoResult, InitSetRejection};
pub use types::{ArtifactKind, RejectedArtifact, SignerId};

// Filters
pub use filter::{n_choose_k, PermutationFilters, SignerRoster, SignerSetFilter, MAX_SIGNERS};

// Key material
pub use keys::{
    aggregate_partial_key_images, compute_partial_key_image, deal_accounts, deal_key_shares,
    generator_g, generator_u, generator_x, hash_to_point, lagrange_coefficient,
    KeyShareProvider, MultisigAccount,
};

// Nonces
pub use nonce::{NoncePubkeys, NonceRecordKey, NonceVault};

// Single-party proofs
pub use proofs::{
    prove_clsag, prove_composition, verify_clsag, verify_composition, ClsagProof,
    CompositionProof, RingMember, MIN_RING_SIZE,
};

// Multisig adapters
pub use adapter::{
    finalize, propose_clsag, propose_composition, validate_batch, ClsagPartial, ClsagSecrets,
    CompletedProof, CompositionPartial, CompositionSecrets, PartialSignature, ProofKind,
    ProofProposal, ProofRequest, ProofSecrets,
};

// Rounds and ceremony
pub use ceremony::{Ceremony, CeremonyState};
pub use init_set::{filter_init_sets, FilteredInitSets, InitSet, InitSetCollection, InitSetEntry};
pub use partial_sig_set::{
    build_partial_sig_sets, filter_partial_sig_sets, FilterFailure, FilteredPartialSigSets,
    PartialSigSet, PartialSigSetBuild, PartialSigSetCollection,
};
