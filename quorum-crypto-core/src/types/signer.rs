//! Signer identities.

use core::fmt;

use curve25519_dalek::{constants::ED25519_BASEPOINT_TABLE, Scalar};
use serde::{Deserialize, Serialize};

use super::sanitize::sanitize_hex;
use super::serde_hex;

/// Public key naming one of the fixed participants of a multisig account.
///
/// Identities are compared by their compressed encoding; the roster decides
/// which bit of a filter each identity owns.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerId(#[serde(with = "serde_hex::bytes32")] pub [u8; 32]);

impl SignerId {
    /// Identity for a signer's long-term private key (`id = sk * G`).
    #[must_use]
    pub fn from_secret(secret: &Scalar) -> Self {
        Self((secret * ED25519_BASEPOINT_TABLE).compress().to_bytes())
    }

    /// Raw compressed key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Sanitized form for logs and error contexts.
    #[must_use]
    pub fn short(&self) -> String {
        sanitize_hex(&self.0)
    }
}

impl fmt::Debug for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerId({})", self.short())
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}
