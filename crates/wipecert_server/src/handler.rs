//! Request handlers and error mapping.

use crate::api::AppState;
use crate::wipe::{WipeError, WipeOutcome};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use wipecert_certify::{CertError, CertificateView, IssueResult, Stats, VerifyResult};

/// Handler result type
pub type HandlerResult<T> = Result<Json<T>, HandlerError>;

/// Errors returned to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Certification failure
    #[error(transparent)]
    Cert(#[from] CertError),

    /// Wipe execution failure
    #[error(transparent)]
    Wipe(#[from] WipeError),

    /// Body is not valid JSON for the endpoint
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl From<JsonRejection> for HandlerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Malformed(rejection.body_text())
    }
}

impl HandlerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Cert(err) => match err {
                CertError::MissingInput(_) | CertError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
                CertError::NotFound(_) => StatusCode::NOT_FOUND,
                CertError::AnchorRejected(_) => StatusCode::CONFLICT,
                CertError::AnchorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                CertError::AnchorTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                CertError::KeyUnavailable(_) | CertError::IndexWriteFailure { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Wipe(err) => match err {
                WipeError::NotConfigured => StatusCode::NOT_IMPLEMENTED,
                WipeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                WipeError::Spawn(_) | WipeError::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Cert(err) => match err {
                CertError::MissingInput(_) => "missing_input",
                CertError::InvalidDocument(_) => "invalid_document",
                CertError::KeyUnavailable(_) => "key_unavailable",
                CertError::AnchorUnavailable(_) => "anchor_unavailable",
                CertError::AnchorTimeout { .. } => "anchor_timeout",
                CertError::AnchorRejected(_) => "anchor_rejected",
                CertError::IndexWriteFailure { .. } => "index_write_failure",
                CertError::NotFound(_) => "not_found",
            },
            Self::Wipe(err) => match err {
                WipeError::NotConfigured => "wipe_not_configured",
                WipeError::Spawn(_) => "wipe_spawn",
                WipeError::Failed { .. } => "wipe_failed",
                WipeError::Timeout { .. } => "wipe_timeout",
            },
            Self::Malformed(_) => "malformed_request",
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "kind": self.kind(),
            "error": self.to_string(),
        });
        // Anchoring succeeded; the caller still needs the receipt
        if let Self::Cert(CertError::IndexWriteFailure { issued, .. }) = &self {
            body["issued"] = serde_json::to_value(issued.as_ref()).unwrap_or(Value::Null);
        }
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), error = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

/// `POST /api/certificate/issue`
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Certificate ID
    #[serde(rename = "certID", alias = "certId")]
    pub cert_id: Option<String>,
    /// Certificate document
    #[serde(alias = "certJSON")]
    pub document: Option<Value>,
}

/// `POST /api/certificate/verify`
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Certificate ID
    #[serde(rename = "certID", alias = "certId")]
    pub cert_id: Option<String>,
    /// Certificate document
    #[serde(alias = "certJSON")]
    pub document: Option<Value>,
    /// Base64 signature returned by issue
    #[serde(rename = "signatureText", alias = "signatureBase64")]
    pub signature: Option<String>,
}

/// `POST /api/certificate/verify-digest`
#[derive(Debug, Deserialize)]
pub struct DigestCheckRequest {
    /// Certificate ID
    #[serde(rename = "certID", alias = "certId")]
    pub cert_id: Option<String>,
    /// Hex digest
    #[serde(rename = "digestHex", alias = "digest")]
    pub digest: Option<String>,
}

/// Response of the raw digest check
#[derive(Debug, Serialize)]
pub struct DigestCheckResponse {
    /// Digest is recorded for the certificate
    pub valid: bool,
}

/// `POST /api/wipe`
#[derive(Debug, Deserialize)]
pub struct WipeRequest {
    /// Device or file to wipe
    pub path: Option<String>,
    /// Wipe method name
    pub method: Option<String>,
}

/// Service status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Always "ok" when the server answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Ledger backend description
    pub ledger: String,
    /// Index backend description
    pub index: String,
    /// Canonicalization mode
    pub canonical_mode: String,
    /// SHA-256 of the public key SPKI DER
    pub key_fingerprint: String,
}

fn required(field: Option<String>, name: &str) -> Result<String, HandlerError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CertError::MissingInput(format!("{name} is required")).into())
}

fn required_document(document: Option<Value>) -> Result<Value, HandlerError> {
    match document {
        Some(Value::Null) | None => Err(CertError::MissingInput("document is required".into()).into()),
        Some(doc) => Ok(doc),
    }
}

/// Issue and anchor a certificate
pub async fn issue(
    State(state): State<AppState>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> HandlerResult<IssueResult> {
    let Json(req) = payload?;
    let cert_id = required(req.cert_id, "certID")?;
    let document = required_document(req.document)?;
    Ok(Json(state.service.issue(&cert_id, &document).await?))
}

/// Verify a document and signature against the ledger
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> HandlerResult<VerifyResult> {
    let Json(req) = payload?;
    let cert_id = required(req.cert_id, "certID")?;
    let document = required_document(req.document)?;
    let signature = required(req.signature, "signatureText")?;
    Ok(Json(state.service.verify(&cert_id, &document, &signature).await?))
}

/// Check a raw digest against the ledger
pub async fn verify_digest(
    State(state): State<AppState>,
    payload: Result<Json<DigestCheckRequest>, JsonRejection>,
) -> HandlerResult<DigestCheckResponse> {
    let Json(req) = payload?;
    let cert_id = required(req.cert_id, "certID")?;
    let digest = required(req.digest, "digestHex")?;
    let valid = state.service.check_digest(&cert_id, &digest).await?;
    Ok(Json(DigestCheckResponse { valid }))
}

/// `GET /api/certificate/fetch/{cert_id}`
pub async fn fetch(
    State(state): State<AppState>,
    Path(cert_id): Path<String>,
) -> HandlerResult<CertificateView> {
    Ok(Json(state.service.fetch(&cert_id).await?))
}

/// Aggregate over indexed certificates
pub async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.service.stats().await)
}

/// Service status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ledger: state.service.anchor().describe(),
        index: state.service.index().describe(),
        canonical_mode: state.service.canonical_mode().to_string(),
        key_fingerprint: state.fingerprint.to_string(),
    })
}

/// Run the external wipe executable
pub async fn wipe(
    State(state): State<AppState>,
    payload: Result<Json<WipeRequest>, JsonRejection>,
) -> HandlerResult<WipeOutcome> {
    let Json(req) = payload?;
    let path = required(req.path, "path")?;
    let method = required(req.method, "method")?;
    Ok(Json(state.wipe.run(&path, &method).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipecert_core::{CertId, Digest, TxId};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CertError::MissingInput("x".into()), StatusCode::BAD_REQUEST),
            (CertError::InvalidDocument("x".into()), StatusCode::BAD_REQUEST),
            (CertError::NotFound("c1".into()), StatusCode::NOT_FOUND),
            (CertError::AnchorRejected("x".into()), StatusCode::CONFLICT),
            (CertError::AnchorUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                CertError::AnchorTimeout {
                    operation: "submit",
                    after_ms: 1,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(HandlerError::from(err).status(), status);
        }
        assert_eq!(
            HandlerError::from(WipeError::NotConfigured).status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[tokio::test]
    async fn test_index_write_failure_body_carries_receipt() {
        let err = HandlerError::from(CertError::IndexWriteFailure {
            issued: Box::new(IssueResult {
                cert_id: CertId::new("c1").unwrap(),
                digest: Digest::compute(b"x"),
                signature: "sig".into(),
                tx_id: TxId::new("0x01"),
            }),
            reason: "disk full".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "index_write_failure");
        assert_eq!(body["issued"]["txId"], "0x01");
        assert_eq!(body["issued"]["certID"], "c1");
    }

    #[test]
    fn test_request_aliases() {
        let req: VerifyRequest = serde_json::from_value(json!({
            "certID": "c1",
            "certJSON": {"a": 1},
            "signatureBase64": "c2ln"
        }))
        .unwrap();
        assert_eq!(req.cert_id.as_deref(), Some("c1"));
        assert_eq!(req.signature.as_deref(), Some("c2ln"));
        assert!(req.document.is_some());
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("  ".into()), "certID").is_err());
        assert!(required(None, "certID").is_err());
        assert_eq!(required(Some("c1".into()), "certID").unwrap(), "c1");
        assert!(required_document(Some(Value::Null)).is_err());
    }
}
