//! Error types for ceremony operations
//!
//! This module defines all error types used throughout quorum-crypto-core.
//! Errors are categorized by the component that raised them. Error payloads
//! carry identifiers (signer keys, filters, hex prefixes of messages and proof
//! keys) but never secret nonces or key shares.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::SignerSetFilter;

/// Result type alias for ceremony operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Reason an initialization set failed conformance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InitSetRejection {
    /// Structural problem: wrong entry counts, wrong base-point counts,
    /// undecodable commitments.
    SemanticsFailure,
    /// The claimed aggregate filter differs from the ceremony's.
    UnexpectedFilter,
    /// The signer is not declared, or not invited by the aggregate filter.
    UnexpectedSigner,
    /// The set was built for another message.
    UnexpectedMessage,
    /// The proof keys do not match the ceremony's batch.
    UnexpectedProofKey,
}

impl fmt::Display for InitSetRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InitSetRejection::SemanticsFailure => "semantics failure",
            InitSetRejection::UnexpectedFilter => "unexpected filter",
            InitSetRejection::UnexpectedSigner => "unexpected signer",
            InitSetRejection::UnexpectedMessage => "unexpected message",
            InitSetRejection::UnexpectedProofKey => "unexpected proof key",
        };
        f.write_str(label)
    }
}

/// Comprehensive error type for all ceremony operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    // =========================================================================
    // Signer-set filter errors
    // =========================================================================
    /// Malformed or out-of-range signer subset
    #[error("Invalid signer filter {filter}: {reason}")]
    InvalidFilter {
        /// The offending filter
        filter: SignerSetFilter,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid threshold parameters (threshold == 0, threshold > signers, too many signers)
    #[error("Invalid threshold {threshold}/{max_signers}: threshold must be >= 1 and <= signers (<= 16)")]
    InvalidThreshold {
        /// The requested threshold
        threshold: u32,
        /// The number of declared signers
        max_signers: u32,
    },

    /// A signer identity is unknown or declared twice
    #[error("Invalid signer {signer}: {reason}")]
    InvalidSigner {
        /// Sanitized signer key
        signer: String,
        /// What is wrong with it
        reason: String,
    },

    // =========================================================================
    // Round 1: initialization sets
    // =========================================================================
    /// An initialization set failed conformance checks
    #[error("Bad initialization set from {signer} ({reason}): {detail}")]
    BadInitSet {
        /// Sanitized signer key the set claims to come from
        signer: String,
        /// Reason code
        reason: InitSetRejection,
        /// Human-readable context
        detail: String,
    },

    // =========================================================================
    // Round 2: partial signature sets
    // =========================================================================
    /// A partial signature set failed conformance checks
    #[error("Bad partial signature set from {signer} for filter {filter}: {detail}")]
    BadPartialSigSet {
        /// Sanitized signer key the set claims to come from
        signer: String,
        /// Filter the set claims to sign for
        filter: SignerSetFilter,
        /// Human-readable context
        detail: String,
    },

    /// The local signer failed to produce a partial signature for one proof
    #[error("Partial signature failed for proof {proof_key} on filter {filter}: {detail}")]
    PartialSignatureFailed {
        /// Sanitized proof key
        proof_key: String,
        /// Filter being signed
        filter: SignerSetFilter,
        /// Human-readable context
        detail: String,
    },

    // =========================================================================
    // Nonce vault
    // =========================================================================
    /// No nonce record for the key (never ensured, or already consumed)
    #[error("Nonce record not found (message {message}, proof key {proof_key}, filter {filter})")]
    NotFound {
        /// Sanitized message
        message: String,
        /// Sanitized proof key
        proof_key: String,
        /// Permutation filter of the record
        filter: SignerSetFilter,
    },

    // =========================================================================
    // Aggregation
    // =========================================================================
    /// Combined partial signatures do not yield a verifying proof
    #[error("Proof assembly failed: {0}")]
    AssemblyFailed(String),

    /// No permutation filter reached full T-signer coverage
    #[error("Insufficient signers: threshold {threshold}, best filter coverage {covered}")]
    InsufficientSigners {
        /// Required number of signers
        threshold: u32,
        /// Largest number of distinct signers seen on one filter
        covered: u32,
    },

    /// Operation not allowed in the ceremony's current state
    #[error("Invalid ceremony state: expected {expected}, actual {actual}")]
    InvalidCeremonyState {
        /// State(s) the operation requires
        expected: String,
        /// Current state
        actual: String,
    },

    // =========================================================================
    // Proof inputs
    // =========================================================================
    /// Proposal or signing context is inconsistent
    #[error("Invalid proof proposal: {0}")]
    InvalidProposal(String),

    /// Ring size too small
    #[error("Ring size {actual} too small, minimum is {minimum}")]
    RingSizeTooSmall {
        /// Actual ring size
        actual: usize,
        /// Minimum required
        minimum: usize,
    },

    /// Signer index out of ring bounds
    #[error("Signer index {index} out of bounds for ring size {ring_size}")]
    SignerIndexOutOfBounds {
        /// The signer index
        index: usize,
        /// Ring size
        ring_size: usize,
    },

    /// Invalid public key format or value
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid private/secret key format or value
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// Serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CryptoError {
    /// Whether this error can only have been caused by a peer's artifact.
    ///
    /// Peer errors are filtered out of a ceremony; everything else is local
    /// and stops the step that raised it.
    #[must_use]
    pub fn is_peer_fault(&self) -> bool {
        matches!(
            self,
            CryptoError::BadInitSet { .. } | CryptoError::BadPartialSigSet { .. }
        )
    }
}
