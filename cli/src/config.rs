//! Simulator configuration.
//!
//! Values come from the environment (after `.env` is loaded). Out-of-range
//! values are clamped with a warning rather than rejected.

use std::env;

use quorum_crypto_core::{ProofKind, MAX_SIGNERS, MIN_RING_SIZE};

/// Default threshold `T`.
///
/// Override via QUORUM_THRESHOLD environment variable.
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Default number of signers `N`.
///
/// Override via QUORUM_SIGNERS environment variable.
pub const DEFAULT_SIGNERS: u32 = 3;

/// Default number of proofs per ceremony.
///
/// Override via QUORUM_BATCH_SIZE environment variable.
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Largest batch the simulator will build.
pub const MAX_BATCH_SIZE: usize = 16;

/// Default CLSAG ring size.
///
/// Override via QUORUM_RING_SIZE environment variable.
pub const DEFAULT_RING_SIZE: usize = 11;

/// Largest ring the simulator will build.
pub const MAX_RING_SIZE: usize = 128;

/// Everything one simulated ceremony needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Threshold `T`
    pub threshold: u32,
    /// Number of signers `N`
    pub signers: u32,
    /// Proof family of the batch
    pub proof_kind: ProofKind,
    /// Proofs per ceremony
    pub batch_size: usize,
    /// Ring size for CLSAG batches
    pub ring_size: usize,
    /// Roster indices that never send anything
    pub offline: Vec<usize>,
    /// Roster index that corrupts its partial signatures
    pub byzantine: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            signers: DEFAULT_SIGNERS,
            proof_kind: ProofKind::Composition,
            batch_size: DEFAULT_BATCH_SIZE,
            ring_size: DEFAULT_RING_SIZE,
            offline: Vec::new(),
            byzantine: None,
        }
    }
}

impl SimulationConfig {
    /// Read the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let signers = clamp(
            "QUORUM_SIGNERS",
            parse(&lookup, "QUORUM_SIGNERS").unwrap_or(DEFAULT_SIGNERS),
            1,
            MAX_SIGNERS as u32,
        );
        let threshold = clamp(
            "QUORUM_THRESHOLD",
            parse(&lookup, "QUORUM_THRESHOLD").unwrap_or(DEFAULT_THRESHOLD),
            1,
            signers,
        );
        let batch_size = clamp(
            "QUORUM_BATCH_SIZE",
            parse(&lookup, "QUORUM_BATCH_SIZE").unwrap_or(DEFAULT_BATCH_SIZE),
            1,
            MAX_BATCH_SIZE,
        );
        let ring_size = clamp(
            "QUORUM_RING_SIZE",
            parse(&lookup, "QUORUM_RING_SIZE").unwrap_or(DEFAULT_RING_SIZE),
            MIN_RING_SIZE,
            MAX_RING_SIZE,
        );

        let proof_kind = match lookup("QUORUM_PROOF_KIND") {
            None => ProofKind::Composition,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "QUORUM_PROOF_KIND unknown, using composition");
                ProofKind::Composition
            }),
        };

        let mut offline: Vec<usize> = lookup("QUORUM_OFFLINE")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| match s.parse::<usize>() {
                        Ok(index) if index < signers as usize => Some(index),
                        _ => {
                            tracing::warn!(value = s, signers, "QUORUM_OFFLINE entry ignored");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        offline.sort_unstable();
        offline.dedup();

        let byzantine = lookup("QUORUM_BYZANTINE").and_then(|raw| match raw.trim().parse::<usize>() {
            Ok(index) if index < signers as usize && !offline.contains(&index) => Some(index),
            _ => {
                tracing::warn!(value = %raw, "QUORUM_BYZANTINE ignored");
                None
            }
        });

        Self {
            threshold,
            signers,
            proof_kind,
            batch_size,
            ring_size,
            offline,
            byzantine,
        }
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn clamp<T: PartialOrd + Copy + std::fmt::Display>(key: &str, value: T, min: T, max: T) -> T {
    if value < min {
        tracing::warn!(key, value = %value, min = %min, "Value below minimum, using minimum");
        min
    } else if value > max {
        tracing::warn!(key, value = %value, max = %max, "Value above maximum, using maximum");
        max
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> SimulationConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SimulationConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), SimulationConfig::default());
    }

    #[test]
    fn test_reads_values() {
        let c = config(&[
            ("QUORUM_THRESHOLD", "3"),
            ("QUORUM_SIGNERS", "5"),
            ("QUORUM_PROOF_KIND", "clsag"),
            ("QUORUM_BATCH_SIZE", "4"),
            ("QUORUM_RING_SIZE", "16"),
            ("QUORUM_OFFLINE", "4, 1"),
            ("QUORUM_BYZANTINE", "2"),
        ]);
        assert_eq!(c.threshold, 3);
        assert_eq!(c.signers, 5);
        assert_eq!(c.proof_kind, ProofKind::Clsag);
        assert_eq!(c.batch_size, 4);
        assert_eq!(c.ring_size, 16);
        assert_eq!(c.offline, vec![1, 4]);
        assert_eq!(c.byzantine, Some(2));
    }

    #[test]
    fn test_clamps_out_of_range() {
        let c = config(&[
            ("QUORUM_SIGNERS", "40"),
            ("QUORUM_THRESHOLD", "0"),
            ("QUORUM_RING_SIZE", "1"),
            ("QUORUM_BATCH_SIZE", "1000"),
        ]);
        assert_eq!(c.signers, MAX_SIGNERS as u32);
        assert_eq!(c.threshold, 1);
        assert_eq!(c.ring_size, MIN_RING_SIZE);
        assert_eq!(c.batch_size, MAX_BATCH_SIZE);

        let c = config(&[("QUORUM_SIGNERS", "2"), ("QUORUM_THRESHOLD", "5")]);
        assert_eq!(c.threshold, 2);
    }

    #[test]
    fn test_ignores_bad_indices() {
        let c = config(&[
            ("QUORUM_OFFLINE", "0,9,x"),
            ("QUORUM_BYZANTINE", "0"),
            ("QUORUM_PROOF_KIND", "schnorr"),
        ]);
        assert_eq!(c.offline, vec![0]);
        assert_eq!(c.byzantine, None);
        assert_eq!(c.proof_kind, ProofKind::Composition);
    }
}
