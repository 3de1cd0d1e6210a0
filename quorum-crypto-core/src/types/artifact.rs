//! Records of rejected peer artifacts.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::errors::CryptoError;
use super::signer::SignerId;
use crate::filter::SignerSetFilter;

/// Which round an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Round 1 broadcast
    InitSet,
    /// Round 2 broadcast
    PartialSigSet,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::InitSet => f.write_str("initialization set"),
            ArtifactKind::PartialSigSet => f.write_str("partial signature set"),
        }
    }
}

/// A peer artifact excluded from a ceremony, and why.
///
/// Enough to identify a misbehaving or stale participant; never carries
/// secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedArtifact {
    /// Signer the artifact claims to come from
    pub signer: SignerId,
    /// Aggregate filter (init sets) or permutation filter (partial sets)
    pub filter: SignerSetFilter,
    /// Which round
    pub artifact: ArtifactKind,
    /// Why it was rejected
    pub error: CryptoError,
}

impl fmt::Display for RejectedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} (filter {}) rejected: {}",
            self.artifact, self.signer, self.filter, self.error
        )
    }
}
