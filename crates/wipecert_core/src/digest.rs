//! Digest binding a canonical document to its signature.
//!
//! Uses SHA-256 over the signed blob `canonical || SEPARATOR || signature`.

use crate::canonical::{CanonicalForm, SEPARATOR};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

/// A SHA-256 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The number of bytes in a digest
    pub const LEN: usize = 32;

    /// Compute SHA-256 of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        use sha2::Digest as _;
        Self(Sha256::digest(data).into())
    }

    /// Compute the digest of a signed certificate
    ///
    /// Any change to either the canonical form or the signature text
    /// changes the result.
    #[must_use]
    pub fn of_signed(canonical: &CanonicalForm, signature_text: &str) -> Self {
        Self::compute(&signed_blob(canonical, signature_text))
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(hex: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(hex).map_err(|_| DigestError::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Check if digest matches data
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::str::FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Serialized as hex, the form the ledger stores
impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Digest-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// Invalid hex encoding
    #[error("invalid hex encoding")]
    InvalidHex,
    /// Invalid length (not 32 bytes)
    #[error("invalid digest length: {0} (expected 32)")]
    InvalidLength(usize),
}

impl From<DigestError> for crate::CoreError {
    fn from(err: DigestError) -> Self {
        Self::InvalidDigest {
            reason: err.to_string(),
        }
    }
}

/// Build the exact byte string that is digested: `canonical || "||" || signature`
#[must_use]
pub fn signed_blob(canonical: &CanonicalForm, signature_text: &str) -> Vec<u8> {
    let mut blob =
        Vec::with_capacity(canonical.as_bytes().len() + SEPARATOR.len() + signature_text.len());
    blob.extend_from_slice(canonical.as_bytes());
    blob.extend_from_slice(SEPARATOR);
    blob.extend_from_slice(signature_text.as_bytes());
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalMode, canonicalize};
    use serde_json::json;

    /// SHA-256 of the empty byte slice
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_digest_known_values() {
        assert_eq!(Digest::compute(b"").to_hex(), EMPTY_SHA256);
        assert_eq!(
            Digest::compute(b"hello").to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_digest_from_to_hex() {
        let digest = Digest::compute(b"test");
        let restored = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, restored);
        assert_eq!(digest.to_hex().len(), 64);
    }

    #[test]
    fn test_from_hex_errors() {
        assert_eq!(Digest::from_hex("zz"), Err(DigestError::InvalidHex));
        assert_eq!(Digest::from_hex("abcd"), Err(DigestError::InvalidLength(2)));
    }

    #[test]
    fn test_signed_blob_layout() {
        let canon = canonicalize(&json!({"a": 1}), CanonicalMode::Recursive).unwrap();
        let blob = signed_blob(&canon, "c2ln");
        assert_eq!(blob, br#"{"a":1}||c2ln"#.to_vec());
        assert!(Digest::of_signed(&canon, "c2ln").verify(&blob));
    }

    #[test]
    fn test_digest_binds_document_and_signature() {
        let canon = canonicalize(&json!({"device": "X1"}), CanonicalMode::Recursive).unwrap();
        let other = canonicalize(&json!({"device": "X2"}), CanonicalMode::Recursive).unwrap();

        let base = Digest::of_signed(&canon, "sig");
        assert_ne!(base, Digest::of_signed(&canon, "sih"));
        assert_ne!(base, Digest::of_signed(&other, "sig"));
        assert_eq!(base, Digest::of_signed(&canon, "sig"));
    }

    #[test]
    fn test_digest_serde_as_hex() {
        let digest = Digest::compute(b"x");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert!(serde_json::from_str::<Digest>("\"00\"").is_err());
    }
}
