//! Results returned by the certification operations.

use serde::{Deserialize, Serialize};
use wipecert_core::{CertId, Digest, Timestamp, TxId};

/// Receipt of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResult {
    /// Certificate ID
    #[serde(rename = "certID")]
    pub cert_id: CertId,
    /// Anchored digest
    #[serde(rename = "digestHex")]
    pub digest: Digest,
    /// Base64 signature over the canonical form
    #[serde(rename = "signatureText")]
    pub signature: String,
    /// Confirmed ledger transaction
    pub tx_id: TxId,
}

/// Outcome of verifying a (document, signature) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    /// Signature matches the canonical form under the service key
    pub valid_signature: bool,
    /// The derived digest is recorded on the ledger for this certID
    pub anchored: bool,
}

impl VerifyResult {
    /// Result for a signature that failed validation
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            valid_signature: false,
            anchored: false,
        }
    }

    /// Both checks passed
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid_signature && self.anchored
    }
}

/// Ledger record merged with the locally cached transaction id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateView {
    /// Certificate ID
    #[serde(rename = "certID")]
    pub cert_id: CertId,
    /// Anchored digest (ledger)
    #[serde(rename = "digestHex")]
    pub digest: Digest,
    /// Confirmation time (ledger)
    pub timestamp: Timestamp,
    /// Submitting identity (ledger)
    pub issuer: String,
    /// Transaction id (local index), if known
    pub tx_id: Option<TxId>,
}

/// Aggregate over the certificates known to the local index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Certificates successfully read back from the ledger
    pub total_certificates: u64,
    /// Distinct issuers among them
    pub unique_issuers: u64,
    /// Most recent confirmation time
    pub last_issued: Option<Timestamp>,
}
