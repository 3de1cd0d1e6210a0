//! Nonce handling for threshold proofs.
//!
//! - [`binonce`]: MuSig2 nonce pairs, commitments and the merge factor
//! - [`vault`]: the per-signer single-use nonce store

pub mod binonce;
pub mod vault;

pub use binonce::{binonce_merge_factor, BinonceAggregate, NoncePubkeys, SecretNoncePair};
pub use vault::{NonceRecordKey, NonceVault};
