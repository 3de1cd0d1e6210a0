//! Core type definitions for quorum-crypto-core
//!
//! This module contains:
//! - Error types for ceremony operations
//! - Signer identities
//! - Rejected-artifact records
//! - Hex serde adapters for wire types
//! - Log sanitization helpers

pub mod artifact;
pub mod errors;
pub mod sanitize;
pub mod serde_hex;
pub mod signer;

// Re-export error types
pub use errors::{CryptoError, CryptoResult, InitSetRejection};

pub use artifact::{ArtifactKind, RejectedArtifact};
pub use sanitize::sanitize_hex;
pub use signer::SignerId;
