//! Certificate and transaction identifiers.
//!
//! Certificate IDs are chosen by the caller (a wipe job reference, an asset
//! tag) rather than generated, so the only guarantees are the ones checked
//! here.

use crate::digest::Digest;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Certificate identifier - the ledger key of an anchored certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertId(String);

impl CertId {
    /// Maximum length in bytes
    pub const MAX_LEN: usize = 256;

    /// Create a certificate ID
    ///
    /// # Errors
    ///
    /// Returns error if the ID is empty, too long, or contains control characters
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidId {
                reason: "must not be empty".to_string(),
            });
        }
        if id.len() > Self::MAX_LEN {
            return Err(CoreError::InvalidId {
                reason: format!("longer than {} bytes", Self::MAX_LEN),
            });
        }
        if id.chars().any(char::is_control) {
            return Err(CoreError::InvalidId {
                reason: "contains control characters".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CertId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CertId> for String {
    fn from(id: CertId) -> Self {
        id.0
    }
}

impl std::str::FromStr for CertId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for CertId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ledger transaction identifier (0x-prefixed hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Create a transaction ID
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a transaction ID from a digest of the transaction contents
    #[must_use]
    pub fn from_digest(digest: &Digest) -> Self {
        Self(format!("0x{}", digest.to_hex()))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cert_id_valid() {
        let id = CertId::new("c1").unwrap();
        assert_eq!(id.as_str(), "c1");
        assert_eq!(id.to_string(), "c1");
    }

    #[test]
    fn test_cert_id_rejects_empty() {
        assert!(CertId::new("").is_err());
        assert!(CertId::new("   ").is_err());
    }

    #[test]
    fn test_cert_id_rejects_long_and_control() {
        assert!(CertId::new("x".repeat(CertId::MAX_LEN + 1)).is_err());
        assert!(CertId::new("x".repeat(CertId::MAX_LEN)).is_ok());
        assert!(CertId::new("a\nb").is_err());
    }

    #[test]
    fn test_cert_id_serde() {
        let id: CertId = serde_json::from_str("\"cert-42\"").unwrap();
        assert_eq!(id.as_str(), "cert-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cert-42\"");
        assert!(serde_json::from_str::<CertId>("\"\"").is_err());
    }

    #[test]
    fn test_tx_id_from_digest() {
        let tx = TxId::from_digest(&Digest::compute(b"tx"));
        assert!(tx.as_str().starts_with("0x"));
        assert_eq!(tx.as_str().len(), 66);
        assert_eq!(serde_json::to_string(&TxId::new("0xab")).unwrap(), "\"0xab\"");
    }
}
