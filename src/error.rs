//! Error types for the review service.
//!
//! [`Error`] is what a submission can fail with at the request level.
//! [`BackendError`] is what a collaborator (database, object store, email API)
//! reports; the pipeline decides per call site whether it degrades or surfaces.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;

/// Request-level failure of a submission.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any external call; one reason per violated rule.
    #[error("Invalid submission: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The order already earned its reward; nothing was changed.
    #[error("Order {order_id} already has an accepted review")]
    AlreadyAccepted { order_id: String },

    /// The order record could not be read or written. Retryable.
    #[error("Order record store unavailable: {0}")]
    RecordStore(#[from] BackendError),

    /// Another submission for the same order changed its state first. Retryable.
    #[error("Order {order_id} was modified by a concurrent submission")]
    ConcurrentUpdate { order_id: String },
}

impl Error {
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(vec![reason.into()])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyAccepted { .. } => StatusCode::CONFLICT,
            Error::RecordStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::ConcurrentUpdate { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Error::RecordStore(_) | Error::ConcurrentUpdate { .. })
    }

    fn title(&self) -> &'static str {
        match self {
            Error::Validation(_) => "Invalid input",
            Error::AlreadyAccepted { .. } => "Order already has an accepted review",
            Error::RecordStore(_) => "Order records temporarily unavailable",
            Error::ConcurrentUpdate { .. } => "Order is being processed by another submission",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::RecordStore(ref e) = self {
            tracing::error!("Record store failure: {}", e);
        }

        let reasons = match &self {
            Error::Validation(reasons) => reasons.clone(),
            _ => Vec::new(),
        };

        let body = serde_json::json!({
            "success": false,
            "error": self.title(),
            "message": self.to_string(),
            "reasons": reasons,
            "retryable": self.retryable(),
        });

        (self.status_code(), Json(body)).into_response()
    }
}

/// Failure reported by an external collaborator.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a vision classifier call, kept distinct from a legitimate reject.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier API key is not configured")]
    NotConfigured,

    #[error("classifier rejected the credentials")]
    Unauthorized,

    #[error("classifier rate limit exceeded")]
    RateLimited,

    #[error("classifier rejected the request: {0}")]
    BadRequest(String),

    #[error("classifier call timed out")]
    Timeout,

    #[error("classifier transport error: {0}")]
    Transport(String),

    #[error("classifier returned a malformed answer: {0}")]
    MalformedResponse(String),
}

/// Bounds a collaborator call by `limit`; elapsing is reported as [`BackendError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: std::future::Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(limit)),
    }
}
