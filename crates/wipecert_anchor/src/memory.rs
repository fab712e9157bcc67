//! In-process ledger.
//!
//! Models the certificate registry contract: one record per certificate ID,
//! created once. Re-submitting the same digest is a no-op that returns the
//! original transaction; a different digest is rejected so an anchored
//! certificate can never be silently replaced.
//!
//! Also serves as the test double for the ledger: it counts calls per
//! operation and can be told to fail or stall.

use crate::gateway::{AnchorError, AnchorGateway, AnchorRecord, AnchorResult, TxId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use wipecert_core::{CertId, Digest, Timestamp};

/// Injected failure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFault {
    /// Every call fails as unreachable
    Unavailable,
    /// Every submission is refused
    RejectSubmissions,
}

/// Number of calls per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `submit` calls
    pub submit: u64,
    /// `query` calls
    pub query: u64,
    /// `read` calls
    pub read: u64,
}

#[derive(Debug, Clone)]
struct StoredCertificate {
    record: AnchorRecord,
    tx_id: TxId,
}

/// In-memory certificate registry
pub struct MemoryLedger {
    /// Identity recorded as issuer on every write
    issuer: String,
    /// Records by certificate ID
    records: RwLock<HashMap<CertId, StoredCertificate>>,
    /// Monotonic transaction counter
    sequence: AtomicU64,
    submit_calls: AtomicU64,
    query_calls: AtomicU64,
    read_calls: AtomicU64,
    fault: Mutex<Option<LedgerFault>>,
    latency: Mutex<Duration>,
}

impl MemoryLedger {
    /// Create a new ledger that records `issuer` on every write
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            records: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            submit_calls: AtomicU64::new(0),
            query_calls: AtomicU64::new(0),
            read_calls: AtomicU64::new(0),
            fault: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Inject a failure mode, or clear it with `None`
    pub fn set_fault(&self, fault: Option<LedgerFault>) {
        if let Ok(mut guard) = self.fault.lock() {
            *guard = fault;
        }
    }

    /// Delay every call by `latency` before it is answered
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Calls seen so far
    #[must_use]
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            submit: self.submit_calls.load(Ordering::SeqCst),
            query: self.query_calls.load(Ordering::SeqCst),
            read: self.read_calls.load(Ordering::SeqCst),
        }
    }

    /// Number of anchored certificates
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if no certificate is anchored
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Transaction that anchored `cert_id`, if any
    pub async fn transaction_of(&self, cert_id: &CertId) -> Option<TxId> {
        self.records
            .read()
            .await
            .get(cert_id)
            .map(|stored| stored.tx_id.clone())
    }

    async fn round_trip(&self) -> AnchorResult<()> {
        let latency = self.latency.lock().map(|d| *d).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self.current_fault() {
            Some(LedgerFault::Unavailable) => {
                Err(AnchorError::Unavailable("ledger node unreachable".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn current_fault(&self) -> Option<LedgerFault> {
        self.fault.lock().map(|f| *f).unwrap_or_default()
    }

    fn next_tx_id(&self, cert_id: &CertId, digest: &Digest) -> TxId {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut payload = Vec::new();
        payload.extend_from_slice(cert_id.as_str().as_bytes());
        payload.push(0);
        payload.extend_from_slice(digest.as_bytes());
        payload.extend_from_slice(&seq.to_be_bytes());
        TxId::from_digest(&Digest::compute(&payload))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new("memory-ledger")
    }
}

#[async_trait]
impl AnchorGateway for MemoryLedger {
    async fn submit(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<TxId> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        if self.current_fault() == Some(LedgerFault::RejectSubmissions) {
            return Err(AnchorError::Rejected("submissions disabled".to_string()));
        }

        let mut records = self.records.write().await;
        if let Some(existing) = records.get(cert_id) {
            if existing.record.digest == *digest {
                return Ok(existing.tx_id.clone());
            }
            return Err(AnchorError::Rejected(format!(
                "certificate {} already anchored with a different digest",
                cert_id
            )));
        }

        let tx_id = self.next_tx_id(cert_id, digest);
        records.insert(
            cert_id.clone(),
            StoredCertificate {
                record: AnchorRecord {
                    digest: *digest,
                    timestamp: Timestamp::now(),
                    issuer: self.issuer.clone(),
                },
                tx_id: tx_id.clone(),
            },
        );
        tracing::debug!(cert_id = %cert_id, tx_id = %tx_id, "certificate recorded");
        Ok(tx_id)
    }

    async fn query(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<bool> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self
            .records
            .read()
            .await
            .get(cert_id)
            .is_some_and(|stored| stored.record.digest == *digest))
    }

    async fn read(&self, cert_id: &CertId) -> AnchorResult<Option<AnchorRecord>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self
            .records
            .read()
            .await
            .get(cert_id)
            .map(|stored| stored.record.clone()))
    }

    fn describe(&self) -> String {
        format!("memory (issuer {})", self.issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CertId {
        CertId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_submit_then_read_and_query() {
        let ledger = MemoryLedger::new("0xissuer");
        let digest = Digest::compute(b"doc");

        let tx = ledger.submit(&id("c1"), &digest).await.unwrap();
        assert!(tx.as_str().starts_with("0x"));

        let record = ledger.read(&id("c1")).await.unwrap().unwrap();
        assert_eq!(record.digest, digest);
        assert_eq!(record.issuer, "0xissuer");

        assert!(ledger.query(&id("c1"), &digest).await.unwrap());
        assert!(!ledger.query(&id("c1"), &Digest::compute(b"other")).await.unwrap());
        assert!(!ledger.query(&id("c2"), &digest).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let ledger = MemoryLedger::default();
        assert!(ledger.read(&id("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resubmit_same_digest_is_noop() {
        let ledger = MemoryLedger::default();
        let digest = Digest::compute(b"doc");
        let first = ledger.submit(&id("c1"), &digest).await.unwrap();
        let second = ledger.submit(&id("c1"), &digest).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_resubmit_different_digest_rejected() {
        let ledger = MemoryLedger::default();
        ledger.submit(&id("c1"), &Digest::compute(b"a")).await.unwrap();
        let result = ledger.submit(&id("c1"), &Digest::compute(b"b")).await;
        assert!(matches!(result, Err(AnchorError::Rejected(_))));

        let record = ledger.read(&id("c1")).await.unwrap().unwrap();
        assert_eq!(record.digest, Digest::compute(b"a"));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let ledger = MemoryLedger::default();
        ledger.set_fault(Some(LedgerFault::Unavailable));
        let digest = Digest::compute(b"doc");
        assert!(matches!(
            ledger.submit(&id("c1"), &digest).await,
            Err(AnchorError::Unavailable(_))
        ));
        assert!(ledger.query(&id("c1"), &digest).await.is_err());
        assert!(ledger.read(&id("c1")).await.is_err());

        ledger.set_fault(Some(LedgerFault::RejectSubmissions));
        assert!(matches!(
            ledger.submit(&id("c1"), &digest).await,
            Err(AnchorError::Rejected(_))
        ));
        assert!(ledger.is_empty().await);

        ledger.set_fault(None);
        assert!(ledger.submit(&id("c1"), &digest).await.is_ok());
    }

    #[tokio::test]
    async fn test_call_counts() {
        let ledger = MemoryLedger::default();
        let digest = Digest::compute(b"doc");
        ledger.submit(&id("c1"), &digest).await.unwrap();
        ledger.query(&id("c1"), &digest).await.unwrap();
        ledger.query(&id("c1"), &digest).await.unwrap();
        ledger.read(&id("c1")).await.unwrap();

        assert_eq!(
            ledger.call_counts(),
            CallCounts {
                submit: 1,
                query: 2,
                read: 1
            }
        );
    }

    #[tokio::test]
    async fn test_distinct_transactions() {
        let ledger = MemoryLedger::default();
        let digest = Digest::compute(b"same");
        let a = ledger.submit(&id("c1"), &digest).await.unwrap();
        let b = ledger.submit(&id("c2"), &digest).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(ledger.transaction_of(&id("c2")).await, Some(b));
    }
}
