//! API server

use crate::handler;
use crate::wipe::WipeRunner;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wipecert_certify::{CertificationService, ConfigError, ServiceConfig};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Certification service
    pub service: Arc<CertificationService>,
    /// Wipe executable runner
    pub wipe: Arc<WipeRunner>,
    /// Public key fingerprint, computed once at startup
    pub fingerprint: Arc<str>,
}

impl AppState {
    /// Create state, computing the key fingerprint
    ///
    /// # Errors
    ///
    /// Returns error if the public key cannot be encoded
    pub fn new(service: CertificationService, wipe: WipeRunner) -> Result<Self, ConfigError> {
        let fingerprint = service
            .keys()
            .verifier()
            .fingerprint()
            .map_err(|e| ConfigError::Keys(e.into()))?;
        Ok(Self {
            service: Arc::new(service),
            wipe: Arc::new(wipe),
            fingerprint: fingerprint.into(),
        })
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/certificate/issue", post(handler::issue))
        .route("/api/certificate/verify", post(handler::verify))
        .route("/api/certificate/verify-digest", post(handler::verify_digest))
        .route("/api/certificate/fetch/{cert_id}", get(handler::fetch))
        .route("/api/stats", get(handler::stats))
        .route("/api/status", get(handler::status))
        .route("/api/wipe", post(handler::wipe))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// HTTP server bound to one address
pub struct ApiServer {
    bind: String,
    state: AppState,
}

impl ApiServer {
    /// Create a server
    #[must_use]
    pub fn new(bind: impl Into<String>, state: AppState) -> Self {
        Self {
            bind: bind.into(),
            state,
        }
    }

    /// Assemble the service from configuration
    ///
    /// # Errors
    ///
    /// Returns error if keys, ledger or index cannot be opened
    pub fn from_config(config: &ServiceConfig, bind: impl Into<String>) -> Result<Self, ConfigError> {
        let service = config.build_service()?;
        let state = AppState::new(service, WipeRunner::from_config(&config.wipe))?;
        tracing::info!(
            fingerprint = %state.fingerprint,
            ledger = %state.service.anchor().describe(),
            index = %state.service.index().describe(),
            canonical_mode = %state.service.canonical_mode(),
            wipe = state.wipe.is_configured(),
            "service ready"
        );
        Ok(Self::new(bind, state))
    }

    /// Shared state
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn serve(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("shut down cleanly");
        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::OnceLock;
    use std::time::Duration;
    use tower::ServiceExt;
    use wipecert_anchor::{LedgerFault, MemoryLedger};
    use wipecert_certify::KeyPair;
    use wipecert_storage::MemoryIndex;

    fn keys() -> Arc<KeyPair> {
        static KEYS: OnceLock<Arc<KeyPair>> = OnceLock::new();
        KEYS.get_or_init(|| Arc::new(KeyPair::generate(1024).unwrap()))
            .clone()
    }

    fn app() -> (Router, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new("0xissuer"));
        let service = CertificationService::new(ledger.clone(), Arc::new(MemoryIndex::new()), keys());
        let state = AppState::new(service, WipeRunner::new(None, Duration::from_secs(1))).unwrap();
        (router(state), ledger)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_issue_fetch_verify_over_http() {
        let (app, _ledger) = app();
        let doc = json!({"device": "X1", "wipedBy": "op1"});

        let (status, issued) = call(
            &app,
            "POST",
            "/api/certificate/issue",
            Some(json!({"certID": "c1", "document": doc})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(issued["certID"], "c1");
        let signature = issued["signatureText"].as_str().unwrap().to_string();

        let (status, view) = call(&app, "GET", "/api/certificate/fetch/c1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["digestHex"], issued["digestHex"]);
        assert_eq!(view["txId"], issued["txId"]);
        assert_eq!(view["issuer"], "0xissuer");

        let (status, verified) = call(
            &app,
            "POST",
            "/api/certificate/verify",
            Some(json!({"certID": "c1", "document": doc, "signatureText": signature})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified, json!({"validSignature": true, "anchored": true}));

        let (_, checked) = call(
            &app,
            "POST",
            "/api/certificate/verify-digest",
            Some(json!({"certID": "c1", "digestHex": issued["digestHex"]})),
        )
        .await;
        assert_eq!(checked, json!({"valid": true}));

        let (_, stats) = call(&app, "GET", "/api/stats", None).await;
        assert_eq!(stats["totalCertificates"], 1);
        assert_eq!(stats["uniqueIssuers"], 1);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (app, ledger) = app();

        let (status, body) = call(&app, "POST", "/api/certificate/issue", Some(json!({"certID": "c1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "missing_input");

        let (status, body) = call(&app, "GET", "/api/certificate/fetch/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");

        ledger.set_fault(Some(LedgerFault::Unavailable));
        let (status, body) = call(
            &app,
            "POST",
            "/api/certificate/issue",
            Some(json!({"certID": "c2", "document": {"a": 1}})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "anchor_unavailable");
    }

    #[tokio::test]
    async fn test_fetch_ids_named_like_routes() {
        let (app, _) = app();
        for id in ["issue", "verify", "verify-digest", "fetch"] {
            let (status, issued) = call(
                &app,
                "POST",
                "/api/certificate/issue",
                Some(json!({"certID": id, "document": {"device": "X1"}})),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{id}");

            let (status, view) = call(&app, "GET", &format!("/api/certificate/fetch/{id}"), None).await;
            assert_eq!(status, StatusCode::OK, "{id}");
            assert_eq!(view["certID"], id);
            assert_eq!(view["digestHex"], issued["digestHex"]);
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (app, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/certificate/issue")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_and_unconfigured_wipe() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["canonicalMode"], "recursive");
        assert_eq!(body["keyFingerprint"].as_str().unwrap().len(), 64);
        assert!(body["ledger"].as_str().unwrap().starts_with("memory"));

        let (status, body) = call(
            &app,
            "POST",
            "/api/wipe",
            Some(json!({"path": "/dev/sdz", "method": "zero"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["kind"], "wipe_not_configured");
    }
}
