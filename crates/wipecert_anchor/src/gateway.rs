//! The anchor gateway contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
pub use wipecert_core::TxId;
use wipecert_core::{CertId, Digest, Timestamp};

/// Anchor result type
pub type AnchorResult<T> = Result<T, AnchorError>;

/// Ledger-layer errors
///
/// None of these mean "not anchored". A caller that receives one must not
/// report a certificate as invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// Network or contract failure; nothing was written
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the write
    #[error("ledger rejected write: {0}")]
    Rejected(String),

    /// No answer within the deadline; a submission may or may not have landed
    #[error("ledger {operation} timed out after {after_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Deadline in milliseconds
        after_ms: u64,
    },
}

impl AnchorError {
    /// Whether a retry could succeed without changing the request
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// The authoritative record the ledger keeps for a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Digest of the signed certificate
    pub digest: Digest,
    /// When the record was confirmed
    pub timestamp: Timestamp,
    /// Identity that submitted the record
    pub issuer: String,
}

/// Operations against the external ledger
///
/// Each call is an independent network round-trip with its own failure
/// domain. Implementations must not report `submit` as successful until the
/// write is confirmed.
#[async_trait]
pub trait AnchorGateway: Send + Sync {
    /// Anchor `digest` under `cert_id` and return the confirmed transaction
    ///
    /// # Errors
    ///
    /// Returns [`AnchorError::Unavailable`] on transport or contract failure
    /// and [`AnchorError::Rejected`] if the ledger refuses the write.
    async fn submit(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<TxId>;

    /// Check whether `(cert_id, digest)` is recorded. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns error only on transport failure
    async fn query(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<bool>;

    /// Read the full record, or `None` if the ledger has none
    ///
    /// # Errors
    ///
    /// Returns error only on transport failure
    async fn read(&self, cert_id: &CertId) -> AnchorResult<Option<AnchorRecord>>;

    /// Short description for status reporting
    fn describe(&self) -> String;
}
