// crates/modelhost-core/src/hashing.rs
// ============================================================================
// Module: Modelhost Hashing
// Description: Canonical JSON digests for lifecycle event payloads.
// Purpose: Produce stable input/output digests without leaking payloads.
// Dependencies: serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Lifecycle events carry digests of unit inputs and outputs rather than the
//! payloads themselves. Digests are SHA-256 over the RFC 8785 canonical JSON
//! form, so semantically equal values always digest identically regardless
//! of key order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Digests raw bytes as lower-hex SHA-256.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Digests a JSON value over its canonical (RFC 8785) byte form.
///
/// Canonicalization cannot fail for values produced by `serde_json`; if it
/// ever does, the non-canonical rendering is digested instead so the caller
/// still receives a stable token for equal inputs within one process.
#[must_use]
pub fn digest_value(value: &Value) -> String {
    serde_jcs::to_vec(value).map_or_else(
        |_| digest_bytes(value.to_string().as_bytes()),
        |canonical| digest_bytes(&canonical),
    )
}
