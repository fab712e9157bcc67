//! Certification error taxonomy.

use crate::certificate::IssueResult;
use crate::keys::KeyError;
use wipecert_anchor::AnchorError;
use wipecert_core::CoreError;

/// Certification result type
pub type CertResult<T> = Result<T, CertError>;

/// Errors surfaced by the certification service
///
/// Ledger-layer errors are never folded into a negative verification
/// result: "unreachable" and "invalid" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertError {
    /// A required argument is absent or unusable
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Document is not a non-empty mapping
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Key material could not be loaded or used
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    /// Ledger unreachable or failed; nothing was written
    #[error("anchor unavailable: {0}")]
    AnchorUnavailable(String),

    /// Ledger did not answer in time; a submission may have landed
    #[error("anchor {operation} timed out after {after_ms}ms, outcome unknown")]
    AnchorTimeout {
        /// Ledger operation
        operation: &'static str,
        /// Deadline in milliseconds
        after_ms: u64,
    },

    /// Ledger refused the write
    #[error("anchor rejected: {0}")]
    AnchorRejected(String),

    /// Anchoring succeeded but the local index could not be written
    #[error(
        "certificate {} anchored in {} but index write failed: {reason}",
        .issued.cert_id,
        .issued.tx_id
    )]
    IndexWriteFailure {
        /// Receipt of the successful anchor
        issued: Box<IssueResult>,
        /// Storage error
        reason: String,
    },

    /// Ledger has no record for the certificate
    #[error("certificate not found: {0}")]
    NotFound(String),
}

impl CertError {
    /// Whether the caller sent a bad request
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingInput(_) | Self::InvalidDocument(_) | Self::NotFound(_)
        )
    }
}

impl From<AnchorError> for CertError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::Unavailable(msg) => Self::AnchorUnavailable(msg),
            AnchorError::Rejected(msg) => Self::AnchorRejected(msg),
            AnchorError::Timeout {
                operation,
                after_ms,
            } => Self::AnchorTimeout {
                operation,
                after_ms,
            },
        }
    }
}

impl From<CoreError> for CertError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDocument { reason } | CoreError::Encoding { reason } => {
                Self::InvalidDocument(reason)
            }
            CoreError::InvalidId { reason } => Self::MissingInput(format!("certID: {reason}")),
            CoreError::InvalidDigest { reason } => Self::MissingInput(format!("digest: {reason}")),
        }
    }
}

impl From<KeyError> for CertError {
    fn from(err: KeyError) -> Self {
        Self::KeyUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipecert_core::{CertId, Digest, TxId};

    #[test]
    fn test_anchor_errors_map_one_to_one() {
        assert_eq!(
            CertError::from(AnchorError::Unavailable("down".into())),
            CertError::AnchorUnavailable("down".into())
        );
        assert_eq!(
            CertError::from(AnchorError::Rejected("dup".into())),
            CertError::AnchorRejected("dup".into())
        );
        assert_eq!(
            CertError::from(AnchorError::Timeout {
                operation: "submit",
                after_ms: 30_000
            }),
            CertError::AnchorTimeout {
                operation: "submit",
                after_ms: 30_000
            }
        );
    }

    #[test]
    fn test_core_errors() {
        let err = CertError::from(CoreError::InvalidDocument {
            reason: "empty".into(),
        });
        assert_eq!(err, CertError::InvalidDocument("empty".into()));
        assert!(matches!(
            CertError::from(CoreError::InvalidId { reason: "x".into() }),
            CertError::MissingInput(_)
        ));
    }

    #[test]
    fn test_index_write_failure_display() {
        let err = CertError::IndexWriteFailure {
            issued: Box::new(IssueResult {
                cert_id: CertId::new("c1").unwrap(),
                digest: Digest::compute(b"x"),
                signature: "sig".into(),
                tx_id: TxId::new("0x01"),
            }),
            reason: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "certificate c1 anchored in 0x01 but index write failed: disk full"
        );
        assert!(!err.is_client_error());
    }
}
