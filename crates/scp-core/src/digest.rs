//! # Fingerprints — Content-Addressed Pool Keys
//!
//! A `Fingerprint` is a SHA-256 digest over `CanonicalBytes`. The compiler
//! pool keys its cache by fingerprint, so equal configurations (as JSON
//! values) always address the same compiler.
//!
//! `Fingerprint::of_parts()` accepts only `&CanonicalBytes`: a pool key
//! over non-canonical bytes cannot be produced by construction.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// A SHA-256 digest identifying a canonicalized configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint {
    bytes: [u8; 32],
}

impl Fingerprint {
    /// Wrap a raw 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Fingerprint a sequence of canonical parts.
    ///
    /// Each part is length-prefixed before hashing, so `["ab", "c"]` and
    /// `["a", "bc"]` never collide.
    pub fn of_parts<'a>(parts: impl IntoIterator<Item = &'a CanonicalBytes>) -> Self {
        Self::of_fields(parts.into_iter().map(CanonicalBytes::as_bytes))
    }

    /// Length-prefixed digest over raw fields. Callers must supply a fixed
    /// field layout; the route storage key is the only user.
    pub(crate) fn of_fields<'a>(fields: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self { bytes }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}
