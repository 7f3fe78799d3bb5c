use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::error::{DispatchError, JobError, ResolveError};

pub type ApiResult<T> = Result<T, ApiError>;

/// Error leaving an HTTP handler, rendered as `{ok: false, error}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}
impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYMENT_REQUIRED, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"ok": false, "error": self.message})),
        )
            .into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Invalid(_) | ResolveError::Unsupported { .. } => {
                Self::bad_request(e.to_string())
            }
            ResolveError::Upstream { .. } => Self::bad_gateway(e.to_string()),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::InvalidInput(e) => e.into(),
            worker @ DispatchError::Worker(_) => Self::bad_gateway(worker.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({"ok": true, "now": chrono::Utc::now().timestamp_millis()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provider;

    #[test]
    fn resolve_errors_map_to_statuses() {
        let invalid: ApiError = ResolveError::Invalid("x".to_string()).into();
        let upstream: ApiError = ResolveError::upstream(Provider::Spotify, "boom").into();

        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert!(upstream.message.contains("boom"));
    }

    #[test]
    fn dispatch_errors_map_to_statuses() {
        let missing: ApiError = DispatchError::InvalidInput(JobError::MissingFields).into();
        let worker: ApiError = DispatchError::Worker("refused".to_string()).into();

        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(worker.status(), StatusCode::BAD_GATEWAY);
    }
}
