//! Ceremony state machine.
//!
//! ```text
//! Proposed → InitCollecting → PartialSigning → Aggregating → Complete
//!    │             │                │               │
//!    └─────────────┴────────────────┴───────────────┴──→ Aborted
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::errors::CryptoError;

/// Where a ceremony is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyState {
    /// Batch, message and aggregate filter fixed; nothing broadcast yet.
    Proposed,
    /// Local init set built; accepting peer init sets.
    InitCollecting,
    /// Local partial signature sets built; accepting peer sets.
    PartialSigning,
    /// Combining partial signatures.
    Aggregating,
    /// Every proof assembled and verified.
    Complete,
    /// Given up; no proofs.
    Aborted,
}

impl CeremonyState {
    /// Whether no further input is accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, CeremonyState::Complete | CeremonyState::Aborted)
    }

    pub(crate) fn require(self, expected: &[CeremonyState]) -> Result<(), CryptoError> {
        if expected.contains(&self) {
            return Ok(());
        }
        let expected = expected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(CryptoError::InvalidCeremonyState {
            expected,
            actual: self.to_string(),
        })
    }
}

impl fmt::Display for CeremonyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposed => write!(f, "proposed"),
            Self::InitCollecting => write!(f, "init_collecting"),
            Self::PartialSigning => write!(f, "partial_signing"),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Complete => write!(f, "complete"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(CeremonyState::Complete.is_terminal());
        assert!(CeremonyState::Aborted.is_terminal());
        assert!(!CeremonyState::PartialSigning.is_terminal());
    }

    #[test]
    fn test_require_lists_expected_states() {
        let err = CeremonyState::Complete
            .require(&[CeremonyState::Proposed, CeremonyState::InitCollecting])
            .unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidCeremonyState {
                expected: "proposed or init_collecting".into(),
                actual: "complete".into(),
            }
        );
    }
}
