//! JSON-over-HTTP client for a remote ledger gateway.
//!
//! The gateway fronts the registry contract and only answers `submit` once
//! the transaction is confirmed. Endpoints:
//!
//! - `POST {base}/certificates` `{certId, digest}` -> `{txHash}` (409 when refused)
//! - `GET {base}/certificates/{certId}/verify?digest=..` -> `{anchored}`
//! - `GET {base}/certificates/{certId}` -> `{digest, timestamp, issuer}` (404 when absent)

use crate::gateway::{AnchorError, AnchorGateway, AnchorRecord, AnchorResult, TxId};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wipecert_core::{CertId, Digest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    cert_id: &'a str,
    digest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    anchored: bool,
}

/// Remote ledger gateway client
pub struct HttpLedger {
    base: Url,
    http: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpLedger {
    /// Create a client for the gateway at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str) -> AnchorResult<Self> {
        Self::with_connect_timeout(base_url, CONNECT_TIMEOUT)
    }

    /// Create a client with an explicit connection deadline
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn with_connect_timeout(base_url: &str, connect_timeout: Duration) -> AnchorResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| AnchorError::Unavailable(format!("invalid ledger URL {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AnchorError::Unavailable(format!(
                "ledger URL {base_url} cannot be a base"
            )));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AnchorError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base,
            http,
            connect_timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AnchorResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AnchorError::Unavailable("ledger URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // A connect failure means nothing reached the gateway
    fn transport(&self, operation: &'static str, err: reqwest::Error) -> AnchorError {
        let deadline_ms = u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX);
        if err.is_connect() {
            if err.is_timeout() {
                AnchorError::Unavailable(format!(
                    "{operation}: no connection to ledger within {deadline_ms}ms"
                ))
            } else {
                AnchorError::Unavailable(format!("{operation}: cannot connect to ledger: {err}"))
            }
        } else if err.is_timeout() {
            AnchorError::Timeout {
                operation,
                after_ms: deadline_ms,
            }
        } else {
            AnchorError::Unavailable(format!("{operation} request failed: {err}"))
        }
    }
}

async fn unexpected(operation: &str, resp: reqwest::Response) -> AnchorError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    AnchorError::Unavailable(format!("{operation} failed (HTTP {status}): {text}"))
}

#[async_trait]
impl AnchorGateway for HttpLedger {
    async fn submit(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<TxId> {
        let url = self.endpoint(&["certificates"])?;
        let resp = self
            .http
            .post(url)
            .json(&SubmitRequest {
                cert_id: cert_id.as_str(),
                digest: digest.to_hex(),
            })
            .send()
            .await
            .map_err(|e| self.transport("submit", e))?;

        match resp.status() {
            s if s.is_success() => {
                let body: SubmitResponse = resp.json().await.map_err(|e| {
                    AnchorError::Unavailable(format!("invalid submit response: {e}"))
                })?;
                Ok(TxId::new(body.tx_hash))
            }
            StatusCode::CONFLICT => {
                let text = resp.text().await.unwrap_or_default();
                Err(AnchorError::Rejected(text))
            }
            _ => Err(unexpected("submit", resp).await),
        }
    }

    async fn query(&self, cert_id: &CertId, digest: &Digest) -> AnchorResult<bool> {
        let url = self.endpoint(&["certificates", cert_id.as_str(), "verify"])?;
        let resp = self
            .http
            .get(url)
            .query(&[("digest", digest.to_hex())])
            .send()
            .await
            .map_err(|e| self.transport("query", e))?;

        if !resp.status().is_success() {
            return Err(unexpected("query", resp).await);
        }
        let body: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| AnchorError::Unavailable(format!("invalid query response: {e}")))?;
        Ok(body.anchored)
    }

    async fn read(&self, cert_id: &CertId) -> AnchorResult<Option<AnchorRecord>> {
        let url = self.endpoint(&["certificates", cert_id.as_str()])?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport("read", e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let record: AnchorRecord = resp
                    .json()
                    .await
                    .map_err(|e| AnchorError::Unavailable(format!("invalid read response: {e}")))?;
                Ok(Some(record))
            }
            _ => Err(unexpected("read", resp).await),
        }
    }

    fn describe(&self) -> String {
        format!("http ({})", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct StubSubmit {
        cert_id: String,
        digest: String,
    }

    async fn stub_submit(State(ledger): State<Arc<MemoryLedger>>, Json(req): Json<StubSubmit>) -> Response {
        let id = CertId::new(req.cert_id).unwrap();
        let digest = Digest::from_hex(&req.digest).unwrap();
        match ledger.submit(&id, &digest).await {
            Ok(tx) => Json(serde_json::json!({ "txHash": tx.as_str() })).into_response(),
            Err(AnchorError::Rejected(msg)) => (AxumStatus::CONFLICT, msg).into_response(),
            Err(e) => (AxumStatus::BAD_GATEWAY, e.to_string()).into_response(),
        }
    }

    async fn stub_verify(
        State(ledger): State<Arc<MemoryLedger>>,
        Path(id): Path<String>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let id = CertId::new(id).unwrap();
        let digest = Digest::from_hex(&q["digest"]).unwrap();
        let anchored = ledger.query(&id, &digest).await.unwrap();
        Json(serde_json::json!({ "anchored": anchored })).into_response()
    }

    async fn stub_read(State(ledger): State<Arc<MemoryLedger>>, Path(id): Path<String>) -> Response {
        let id = CertId::new(id).unwrap();
        match ledger.read(&id).await.unwrap() {
            Some(record) => Json(record).into_response(),
            None => AxumStatus::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_stub() -> (String, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new("0xgateway"));
        let app = Router::new()
            .route("/api/certificates", post(stub_submit))
            .route("/api/certificates/{id}", get(stub_read))
            .route("/api/certificates/{id}/verify", get(stub_verify))
            .with_state(ledger.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/api/", addr), ledger)
    }

    #[tokio::test]
    async fn test_http_roundtrip_against_stub() {
        let (base, ledger) = spawn_stub().await;
        let client = HttpLedger::new(&base).unwrap();
        let id = CertId::new("cert 1/a").unwrap();
        let digest = Digest::compute(b"doc");

        assert!(client.read(&id).await.unwrap().is_none());

        let tx = client.submit(&id, &digest).await.unwrap();
        assert_eq!(ledger.transaction_of(&id).await, Some(tx));

        assert!(client.query(&id, &digest).await.unwrap());
        assert!(!client.query(&id, &Digest::compute(b"other")).await.unwrap());

        let record = client.read(&id).await.unwrap().unwrap();
        assert_eq!(record.digest, digest);
        assert_eq!(record.issuer, "0xgateway");
    }

    #[tokio::test]
    async fn test_http_conflict_is_rejected() {
        let (base, _ledger) = spawn_stub().await;
        let client = HttpLedger::new(&base).unwrap();
        let id = CertId::new("c1").unwrap();

        client.submit(&id, &Digest::compute(b"a")).await.unwrap();
        let result = client.submit(&id, &Digest::compute(b"b")).await;
        assert!(matches!(result, Err(AnchorError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_http_unreachable_is_unavailable() {
        // Port 9 (discard) on loopback is closed in test environments
        let client = HttpLedger::new("http://127.0.0.1:9/").unwrap();
        let result = client.read(&CertId::new("c1").unwrap()).await;
        assert!(matches!(result, Err(AnchorError::Unavailable(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpLedger::new("not a url").is_err());
        assert!(HttpLedger::new("mailto:ledger@example.com").is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpLedger::with_connect_timeout(&format!("http://{addr}/api/"), Duration::from_millis(500))
                .unwrap();
        let id = CertId::new("c1").unwrap();
        let result = client.submit(&id, &Digest::compute(b"doc")).await;
        assert!(matches!(result, Err(AnchorError::Unavailable(_))), "{result:?}");
        let result = client.read(&id).await;
        assert!(matches!(result, Err(AnchorError::Unavailable(_))), "{result:?}");
    }
}
