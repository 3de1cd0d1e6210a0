//! Log sanitization for ceremony identifiers.
//!
//! Signer keys, proof keys and messages are logged as "abcd1234...90ef"
//! (first 8 + last 4 hex chars): enough to tell participants apart while
//! debugging, without dumping full transcripts into logs.

use alloc::string::String;

/// Sanitize a 32-byte identifier for logs and error contexts.
#[must_use]
pub fn sanitize_hex(bytes: &[u8; 32]) -> String {
    let full = hex::encode(bytes);
    format!("{}...{}", &full[..8], &full[full.len() - 4..])
}
