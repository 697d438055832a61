//! Owner key derivation
//!
//! Persisted state and per-owner bookkeeping are keyed by a digest of the
//! owner identity rather than the identity itself, so session tokens never
//! appear in store keys or file names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// MD5 digest of an owner identity stored as a 16-byte array
///
/// Displays and serializes as a lowercase 32-character hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerKey([u8; 16]);

impl OwnerKey {
    /// Derive the key for a raw owner identity token
    pub fn derive(identity: &str) -> Self {
        OwnerKey(md5::compute(identity.as_bytes()).0)
    }

    /// Parse a key from its hex representation
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` unless `hex` is exactly 32 hex digits
    pub fn from_hex(hex: &str) -> StoreResult<Self> {
        if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::Corrupt {
                reason: format!("invalid owner key: {hex}"),
            });
        }

        let mut bytes = [0u8; 16];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| StoreError::Corrupt {
                reason: format!("invalid owner key: {hex}"),
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| StoreError::Corrupt {
                reason: format!("invalid owner key: {hex}"),
            })?;
        }

        Ok(OwnerKey(bytes))
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(32), |mut acc, b| {
            let _ = write!(&mut acc, "{:02x}", b);
            acc
        })
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for OwnerKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for OwnerKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for OwnerKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}
