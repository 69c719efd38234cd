// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints. Stored documents are keyed by the hash of their bytes.

use std::io;

use docualign_core::error::{DocuAlignError, Result};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether `key` has the shape of a [`hash_bytes`] result.
pub fn is_hash_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Fail with an `InvalidData` I/O error when `data` does not hash to
/// `expected_hex`.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if actual == expected_hex {
        Ok(())
    } else {
        Err(DocuAlignError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("stored bytes hash to {actual}, expected {expected_hex}"),
        )))
    }
}
