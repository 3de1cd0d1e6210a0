//! Hex serde adapters for 32-byte values.
//!
//! Wire types store points and scalars as raw `[u8; 32]`; on the wire they are
//! lowercase hex strings so that encoded sets stay readable and byte-stable.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Deserializer, Serializer};

fn decode_32<E: serde::de::Error>(value: &str) -> Result<[u8; 32], E> {
    let bytes = hex::decode(value).map_err(|e| E::custom(format!("invalid hex: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| E::custom(format!("expected 32 bytes, got {}", bytes.len())))
}

/// `#[serde(with = "serde_hex::bytes32")]`
pub mod bytes32 {
    use super::*;

    /// Serialize as a 64-char hex string.
    pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    /// Deserialize from a 64-char hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_32(&s)
    }
}

/// `#[serde(with = "serde_hex::bytes32_vec")]`
pub mod bytes32_vec {
    use super::*;

    /// Serialize as a sequence of 64-char hex strings.
    pub fn serialize<S: Serializer>(values: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(hex::encode))
    }

    /// Deserialize from a sequence of 64-char hex strings.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<[u8; 32]>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter().map(|s| decode_32::<D::Error>(s)).collect()
    }
}
