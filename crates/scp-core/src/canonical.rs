//! # Canonical Serialization — JCS Byte Production
//!
//! `CanonicalBytes` is the sole construction path for bytes fed into a
//! pool fingerprint.
//!
//! ## Invariant
//!
//! The inner buffer is private. The only constructor is
//! `CanonicalBytes::new()`, which serializes through `serde_jcs` (RFC 8785):
//! object keys sorted by UTF-16 code units, compact separators, and the
//! ECMAScript number rendering. Two schema documents that are equal as JSON
//! values therefore always produce identical bytes, regardless of how the
//! caller built the map.
//!
//! Schema documents legitimately contain fractional numbers
//! (`"multipleOf": 0.01`), so floats pass through; JCS fixes their textual
//! form.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Serialization uses sorted keys with compact separators (RFC 8785).
/// - The bytes are valid UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let bytes = serialize_canonical(&value)?;
        Ok(Self(bytes))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the canonical bytes as a string slice.
    pub fn as_str(&self) -> Result<&str, CanonicalizationError> {
        std::str::from_utf8(&self.0).map_err(|_| CanonicalizationError::InvalidUtf8)
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn serialize_canonical(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let s = serde_jcs::to_string(value)?;
    Ok(s.into_bytes())
}
