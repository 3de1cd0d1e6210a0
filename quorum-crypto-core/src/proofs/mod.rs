//! Single-party proofs.
//!
//! Threshold ceremonies produce exactly these proofs; a verifier cannot tell
//! a jointly produced proof from one made by a single key holder.

pub mod clsag;
pub mod composition;
pub mod hash;

pub use clsag::{
    clsag_mixing_coefficients, clsag_round_challenge, prove_clsag, verify_clsag, ClsagProof,
    ClsagTranscript, RingMember, MIN_RING_SIZE,
};
pub use composition::{
    composition_challenge, composition_key_image, composition_proof_parts, prove_composition,
    verify_composition, CompositionProof,
};
