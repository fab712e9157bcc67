//! The certification service: issue, verify, fetch and stats.

use crate::certificate::{CertificateView, IssueResult, Stats, VerifyResult};
use crate::error::{CertError, CertResult};
use crate::keys::KeyPair;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use wipecert_anchor::AnchorGateway;
use wipecert_core::{CanonicalForm, CanonicalMode, CertId, Digest, canonicalize};
use wipecert_storage::{IndexRecord, IndexStore, KeyedLocks};

/// A document canonicalized, signed and digested, ready to anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedDocument {
    /// Canonical bytes that were signed
    pub canonical: CanonicalForm,
    /// Base64 signature text
    pub signature: String,
    /// Digest of `canonical || SEPARATOR || signature`
    pub digest: Digest,
}

/// Canonicalize, sign and digest `document` without touching the ledger
///
/// # Errors
///
/// Returns [`CertError::InvalidDocument`] for a non-object or empty document
/// and [`CertError::KeyUnavailable`] if signing fails.
pub fn seal(keys: &KeyPair, document: &Value, mode: CanonicalMode) -> CertResult<SealedDocument> {
    let canonical = canonicalize(document, mode)?;
    let signature = keys.signer().sign(canonical.as_bytes())?;
    let digest = Digest::of_signed(&canonical, &signature);
    Ok(SealedDocument {
        canonical,
        signature,
        digest,
    })
}

/// Orchestrates signing, anchoring and the local index
pub struct CertificationService {
    anchor: Arc<dyn AnchorGateway>,
    index: Arc<dyn IndexStore>,
    keys: Arc<KeyPair>,
    mode: CanonicalMode,
    stats_concurrency: usize,
    locks: KeyedLocks,
}

impl CertificationService {
    /// Default number of concurrent ledger reads during `stats`
    pub const DEFAULT_STATS_CONCURRENCY: usize = 8;

    /// Create a service over the given ledger, index and keys
    #[must_use]
    pub fn new(anchor: Arc<dyn AnchorGateway>, index: Arc<dyn IndexStore>, keys: Arc<KeyPair>) -> Self {
        Self {
            anchor,
            index,
            keys,
            mode: CanonicalMode::default(),
            stats_concurrency: Self::DEFAULT_STATS_CONCURRENCY,
            locks: KeyedLocks::new(),
        }
    }

    /// Set the canonicalization mode
    #[must_use]
    pub fn with_canonical_mode(mut self, mode: CanonicalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the stats read concurrency (at least 1)
    #[must_use]
    pub fn with_stats_concurrency(mut self, concurrency: usize) -> Self {
        self.stats_concurrency = concurrency.max(1);
        self
    }

    /// Ledger gateway
    #[must_use]
    pub fn anchor(&self) -> &Arc<dyn AnchorGateway> {
        &self.anchor
    }

    /// Local index
    #[must_use]
    pub fn index(&self) -> &Arc<dyn IndexStore> {
        &self.index
    }

    /// Signing keypair
    #[must_use]
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Canonicalization mode in effect
    #[must_use]
    pub fn canonical_mode(&self) -> CanonicalMode {
        self.mode
    }

    /// Sign, anchor and index a certificate
    ///
    /// The per-certID lock is held from ledger submission through the index
    /// write, so concurrent issues for one certID never interleave.
    ///
    /// # Errors
    ///
    /// - [`CertError::MissingInput`] / [`CertError::InvalidDocument`] for bad input
    /// - ledger errors from `submit`, including [`CertError::AnchorTimeout`]
    /// - [`CertError::IndexWriteFailure`] if anchoring succeeded but the index
    ///   write did not; the receipt is carried in the error
    #[instrument(skip(self, document))]
    pub async fn issue(&self, cert_id: &str, document: &Value) -> CertResult<IssueResult> {
        let cert_id = require_id(cert_id)?;
        require_document(document)?;

        let sealed = seal(&self.keys, document, self.mode)?;

        let _guard = self.locks.lock(&cert_id).await;
        let tx_id = self.anchor.submit(&cert_id, &sealed.digest).await?;

        let issued = IssueResult {
            cert_id,
            digest: sealed.digest,
            signature: sealed.signature,
            tx_id,
        };
        let record = IndexRecord::new(issued.tx_id.clone(), issued.digest, issued.signature.clone());
        if let Err(e) = self.index.put(&issued.cert_id, record).await {
            error!(
                cert_id = %issued.cert_id,
                tx_id = %issued.tx_id,
                reason = %e,
                "anchored but index write failed"
            );
            return Err(CertError::IndexWriteFailure {
                issued: Box::new(issued),
                reason: e.to_string(),
            });
        }

        info!(
            cert_id = %issued.cert_id,
            digest = %issued.digest,
            tx_id = %issued.tx_id,
            "certificate anchored"
        );
        Ok(issued)
    }

    /// Check a (document, signature) pair against the ledger
    ///
    /// An invalid signature returns `{false, false}` without a ledger call.
    ///
    /// # Errors
    ///
    /// Returns input errors, or ledger errors from `query`. A ledger failure
    /// is never reported as `anchored: false`.
    #[instrument(skip(self, document, signature))]
    pub async fn verify(&self, cert_id: &str, document: &Value, signature: &str) -> CertResult<VerifyResult> {
        let cert_id = require_id(cert_id)?;
        require_document(document)?;
        if signature.trim().is_empty() {
            return Err(CertError::MissingInput("signatureText is required".into()));
        }

        let canonical = canonicalize(document, self.mode)?;
        if !self.keys.verifier().verify(canonical.as_bytes(), signature) {
            debug!(%cert_id, "signature invalid, ledger not consulted");
            return Ok(VerifyResult::invalid());
        }

        let digest = Digest::of_signed(&canonical, signature);
        let anchored = self.anchor.query(&cert_id, &digest).await?;
        debug!(%cert_id, %digest, anchored, "verified");
        Ok(VerifyResult {
            valid_signature: true,
            anchored,
        })
    }

    /// Check a raw digest against the ledger, without signature re-derivation
    ///
    /// # Errors
    ///
    /// Returns input errors for a bad certID or digest, or ledger errors
    #[instrument(skip(self))]
    pub async fn check_digest(&self, cert_id: &str, digest_hex: &str) -> CertResult<bool> {
        let cert_id = require_id(cert_id)?;
        if digest_hex.trim().is_empty() {
            return Err(CertError::MissingInput("digestHex is required".into()));
        }
        let digest = Digest::from_hex(digest_hex.trim())
            .map_err(|e| CertError::MissingInput(format!("digestHex: {e}")))?;
        Ok(self.anchor.query(&cert_id, &digest).await?)
    }

    /// Ledger record for `cert_id`, with the cached transaction id
    ///
    /// The transaction id is only attached when the index entry agrees with
    /// the ledger digest. Index failures degrade to `tx_id: None`.
    ///
    /// # Errors
    ///
    /// Returns [`CertError::NotFound`] if the ledger has no record, whatever
    /// the index holds, or ledger errors from `read`.
    #[instrument(skip(self))]
    pub async fn fetch(&self, cert_id: &str) -> CertResult<CertificateView> {
        let cert_id = require_id(cert_id)?;
        let record = self
            .anchor
            .read(&cert_id)
            .await?
            .ok_or_else(|| CertError::NotFound(cert_id.to_string()))?;

        let tx_id = match self.index.get(&cert_id).await {
            Ok(Some(entry)) if entry.digest == record.digest => Some(entry.tx_id),
            Ok(Some(_)) => {
                warn!(%cert_id, "index entry disagrees with ledger digest");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%cert_id, error = %e, "index lookup failed");
                None
            }
        };

        Ok(CertificateView {
            cert_id,
            digest: record.digest,
            timestamp: record.timestamp,
            issuer: record.issuer,
            tx_id,
        })
    }

    /// Aggregate over every certificate in the local index
    ///
    /// Each certID is re-read from the ledger with bounded concurrency.
    /// Per-certificate failures are logged and skipped. An unreadable index
    /// yields an empty aggregate.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Stats {
        let ids = match self.index.cert_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "cannot list index");
                return Stats::default();
            }
        };

        let anchor = &self.anchor;
        let reads: Vec<_> = stream::iter(ids)
            .map(|id| async move {
                let result = anchor.read(&id).await;
                (id, result)
            })
            .buffer_unordered(self.stats_concurrency)
            .collect()
            .await;

        let mut stats = Stats::default();
        let mut issuers = HashSet::new();
        for (id, result) in reads {
            match result {
                Ok(Some(record)) => {
                    stats.total_certificates += 1;
                    stats.last_issued = stats.last_issued.max(Some(record.timestamp));
                    issuers.insert(record.issuer);
                }
                Ok(None) => warn!(cert_id = %id, "indexed certificate missing from ledger"),
                Err(e) => warn!(cert_id = %id, error = %e, "ledger read failed, skipping"),
            }
        }
        stats.unique_issuers = issuers.len() as u64;
        stats
    }
}

fn require_id(raw: &str) -> CertResult<CertId> {
    if raw.trim().is_empty() {
        return Err(CertError::MissingInput("certID is required".into()));
    }
    Ok(CertId::new(raw)?)
}

fn require_document(document: &Value) -> CertResult<()> {
    if document.is_null() {
        return Err(CertError::MissingInput("document is required".into()));
    }
    Ok(())
}
