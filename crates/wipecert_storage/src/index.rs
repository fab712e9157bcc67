//! Index records and the storage contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use wipecert_core::{CertId, Digest, TxId};

/// Index result type
pub type IndexResult<T> = Result<T, IndexError>;

/// Index errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Backing store failure
    #[error("index storage error: {0}")]
    Storage(String),

    /// A stored entry could not be decoded
    #[error("corrupt index entry for {key}: {reason}")]
    Corrupt {
        /// Key of the unreadable entry
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Blocking worker failed
    #[error("index task failed: {0}")]
    Task(String),
}

/// Cached metadata for one anchored certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    /// Transaction that anchored the digest
    pub tx_id: TxId,
    /// Anchored digest
    pub digest: Digest,
    /// Base64 signature text
    pub signature: String,
}

impl IndexRecord {
    /// Create a record
    #[must_use]
    pub fn new(tx_id: TxId, digest: Digest, signature: String) -> Self {
        Self {
            tx_id,
            digest,
            signature,
        }
    }

    /// Encode for storage
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| IndexError::Storage(e.to_string()))
    }

    /// Decode a stored entry
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupt`] if the bytes are not a valid record
    pub fn decode(key: &str, bytes: &[u8]) -> IndexResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| IndexError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Key-value store holding the local certificate index
///
/// `put` must not return before the record is on stable storage.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Look up a certificate
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or the entry is corrupt
    async fn get(&self, cert_id: &CertId) -> IndexResult<Option<IndexRecord>>;

    /// Insert or overwrite a certificate
    ///
    /// # Errors
    ///
    /// Returns error if the record could not be made durable
    async fn put(&self, cert_id: &CertId, record: IndexRecord) -> IndexResult<()>;

    /// All indexed certificate IDs
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    async fn cert_ids(&self) -> IndexResult<Vec<CertId>>;

    /// Short description for status reporting
    fn describe(&self) -> String;
}

/// Non-durable index for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<HashMap<CertId, IndexRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl IndexStore for MemoryIndex {
    async fn get(&self, cert_id: &CertId) -> IndexResult<Option<IndexRecord>> {
        Ok(self.records.read().await.get(cert_id).cloned())
    }

    async fn put(&self, cert_id: &CertId, record: IndexRecord) -> IndexResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IndexError::Storage("writes disabled".to_string()));
        }
        self.records.write().await.insert(cert_id.clone(), record);
        Ok(())
    }

    async fn cert_ids(&self) -> IndexResult<Vec<CertId>> {
        let mut ids: Vec<CertId> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
