//! Deadline enforcement for ledger calls.

use crate::gateway::{AnchorError, AnchorGateway, AnchorRecord, AnchorResult, TxId};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use wipecert_core::{CertId, Digest};

/// Wraps a gateway so every call has an explicit deadline
///
/// A timed-out `submit` has an unknown outcome: the write may have landed.
/// It is reported as [`AnchorError::Timeout`] and never as unavailability.
#[derive(Clone)]
pub struct BoundedGateway {
    inner: Arc<dyn AnchorGateway>,
    submit_timeout: Duration,
    query_timeout: Duration,
}

impl BoundedGateway {
    /// Default deadline for `submit`, which waits for confirmation
    pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default deadline for `query` and `read`
    pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Wrap a gateway with default deadlines
    #[must_use]
    pub fn new(inner: Arc<dyn AnchorGateway>) -> Self {
        Self {
            inner,
            submit_timeout: Self::DEFAULT_SUBMIT_TIMEOUT,
            query_timeout: Self::DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set the `submit` deadline
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Set the `query` and `read` deadline
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = AnchorResult<T>> + Send,
) -> AnchorResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AnchorError::Timeout {
            operation,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[async_trait]
impl AnchorGateway for BoundedGateway {
    async fn submit(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<TxId> {
        bounded("submit", self.submit_timeout, self.inner.submit(cert_id, digest)).await
    }

    async fn query(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<bool> {
        bounded("query", self.query_timeout, self.inner.query(cert_id, digest)).await
    }

    async fn read(&self, cert_id: &CertId) -> AnchorResult<Option<AnchorRecord>> {
        bounded("read", self.query_timeout, self.inner.read(cert_id)).await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
