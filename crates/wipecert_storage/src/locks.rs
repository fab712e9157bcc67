//! Per-certificate mutual exclusion.
//!
//! Writers for the same certID queue on one async mutex while writers for
//! different certIDs never contend. Entries are held weakly and pruned once
//! no guard or waiter references them, so the table stays proportional to
//! the number of in-flight certIDs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use wipecert_core::CertId;

/// Guard held for the duration of a keyed critical section
pub type KeyGuard = OwnedMutexGuard<()>;

/// Table of async locks keyed by certificate ID
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<CertId, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder
    pub async fn lock(&self, key: &CertId) -> KeyGuard {
        let slot = self.slot(key);
        slot.lock_owned().await
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Check if no lock is held or awaited
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &CertId) -> Arc<AsyncMutex<()>> {
        // A poisoned table only means another thread panicked mid-update;
        // the map itself is still consistent.
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(existing) = slots.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, weak| weak.strong_count() > 0);
        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(key.clone(), Arc::downgrade(&fresh));
        fresh
    }
}
