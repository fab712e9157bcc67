//! Durable index backed by a redb file.
//!
//! Every write is its own transaction committed with immediate durability,
//! so a successful `put` has been synced to disk.

use crate::index::{IndexError, IndexRecord, IndexResult, IndexStore};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wipecert_core::CertId;

const CERTIFICATES: TableDefinition<&str, &[u8]> = TableDefinition::new("certificates");

fn storage<E: Into<redb::Error>>(err: E) -> IndexError {
    IndexError::Storage(err.into().to_string())
}

/// redb-backed certificate index
#[derive(Clone)]
pub struct RedbIndex {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbIndex {
    /// Open or create the index file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or is not a redb database
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                IndexError::Storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let db = Database::create(&path).map_err(storage)?;
        // Create the table up front so read transactions never see it missing
        let txn = db.begin_write().map_err(storage)?;
        txn.open_table(CERTIFICATES).map_err(storage)?;
        txn.commit().map_err(storage)?;

        tracing::debug!(path = %path.display(), "index opened");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Location of the index file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, work: F) -> IndexResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> IndexResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(|e| IndexError::Task(e.to_string()))?
    }
}

#[async_trait]
impl IndexStore for RedbIndex {
    async fn get(&self, cert_id: &CertId) -> IndexResult<Option<IndexRecord>> {
        let key = cert_id.to_string();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(storage)?;
            let table = txn.open_table(CERTIFICATES).map_err(storage)?;
            match table.get(key.as_str()).map_err(storage)? {
                Some(value) => IndexRecord::decode(&key, value.value()).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, cert_id: &CertId, record: IndexRecord) -> IndexResult<()> {
        let key = cert_id.to_string();
        let bytes = record.encode()?;
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(storage)?;
            {
                let mut table = txn.open_table(CERTIFICATES).map_err(storage)?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(storage)?;
            }
            txn.commit().map_err(storage)
        })
        .await
    }

    async fn cert_ids(&self) -> IndexResult<Vec<CertId>> {
        self.blocking(|db| {
            let txn = db.begin_read().map_err(storage)?;
            let table = txn.open_table(CERTIFICATES).map_err(storage)?;
            let mut ids = Vec::new();
            for entry in table.iter().map_err(storage)? {
                let (key, _) = entry.map_err(storage)?;
                let key = key.value();
                let id = CertId::new(key).map_err(|e| IndexError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                ids.push(id);
            }
            Ok(ids)
        })
        .await
    }

    fn describe(&self) -> String {
        format!("redb ({})", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipecert_core::{Digest, TxId};

    fn record(tag: &str) -> IndexRecord {
        IndexRecord::new(
            TxId::new(format!("0x{}", tag)),
            Digest::compute(tag.as_bytes()),
            format!("sig-{}", tag),
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let index = RedbIndex::open(dir.path().join("index.redb")).unwrap();
        let id = CertId::new("c1").unwrap();

        assert!(index.get(&id).await.unwrap().is_none());
        index.put(&id, record("a")).await.unwrap();
        assert_eq!(index.get(&id).await.unwrap(), Some(record("a")));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.redb");
        {
            let index = RedbIndex::open(&path).unwrap();
            index.put(&CertId::new("c1").unwrap(), record("a")).await.unwrap();
            index.put(&CertId::new("c2").unwrap(), record("b")).await.unwrap();
        }

        let reopened = RedbIndex::open(&path).unwrap();
        let ids: Vec<String> = reopened
            .cert_ids()
            .await
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(
            reopened.get(&CertId::new("c2").unwrap()).await.unwrap(),
            Some(record("b"))
        );
    }

    #[tokio::test]
    async fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let index = RedbIndex::open(dir.path().join("index.redb")).unwrap();
        let id = CertId::new("c1").unwrap();
        index.put(&id, record("a")).await.unwrap();
        index.put(&id, record("b")).await.unwrap();
        assert_eq!(index.get(&id).await.unwrap(), Some(record("b")));
        assert_eq!(index.cert_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_reported() {
        let dir = tempfile::tempdir().unwrap();
        let index = RedbIndex::open(dir.path().join("index.redb")).unwrap();
        {
            let txn = index.db.begin_write().unwrap();
            {
                let mut table = txn.open_table(CERTIFICATES).unwrap();
                table.insert("bad", b"garbage".as_slice()).unwrap();
            }
            txn.commit().unwrap();
        }
        let result = index.get(&CertId::new("bad").unwrap()).await;
        assert!(matches!(result, Err(IndexError::Corrupt { .. })));
    }

    #[test]
    fn test_open_rejects_non_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.redb");
        std::fs::write(&path, b"this is not a redb file at all, just text").unwrap();
        assert!(RedbIndex::open(&path).is_err());
    }
}
