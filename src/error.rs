//! HTTP-facing error handling.
//!
//! Every failure a handler can report is an [`ApiError`] carrying an
//! [`ErrorCode`], a human-readable message and a unique error id. Errors are
//! rendered as plain-text bodies with the id in the `x-error-id` header, and
//! each one is counted in the `errors_total` metric family.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ERROR_ID_HEADER: &str = "x-error-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request body is not acceptable JSON
    InvalidJson,
    /// The receipt failed schema validation
    SchemaError,
    /// No receipt is stored under the requested id
    ReceiptNotFound,
    /// The request body exceeds the configured limit
    PayloadTooLarge,
    /// An invariant of the service was violated
    InternalError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidJson | ErrorCode::SchemaError => StatusCode::BAD_REQUEST,
            ErrorCode::ReceiptNotFound => StatusCode::NOT_FOUND,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label for this code.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJson => "invalid_json",
            ErrorCode::SchemaError => "schema_error",
            ErrorCode::ReceiptNotFound => "receipt_not_found",
            ErrorCode::PayloadTooLarge => "payload_too_large",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJson | ErrorCode::SchemaError | ErrorCode::PayloadTooLarge => {
                "client_error"
            }
            ErrorCode::ReceiptNotFound => "resource_not_found",
            ErrorCode::InternalError => "server_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.status().as_u16())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    /// Text returned to the client as the response body
    pub message: String,
    /// Unique error ID for tracking
    pub error_id: String,
    /// Handler operation that produced the error
    pub operation: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            error_id: Self::generate_error_id(),
            operation: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn builder(code: ErrorCode) -> ErrorBuilder {
        ErrorBuilder::new(code)
    }

    pub fn schema() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::SchemaError)
    }

    pub fn not_found() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::ReceiptNotFound).message("No receipt found for that id")
    }

    pub fn internal() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::InternalError)
    }

    /// Attribute the error to a handler operation and record it.
    ///
    /// Each error leaving a handler goes through here exactly once.
    pub fn for_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation.to_string());
        self.track();
        self
    }

    /// Record this error in metrics and logs.
    fn track(&self) {
        crate::metrics::METRICS.record_error(self.code.label());
        match self.code {
            ErrorCode::InternalError => tracing::error!(
                error_id = %self.error_id,
                error_code = %self.code,
                operation = self.operation.as_deref(),
                "{}",
                self.message
            ),
            _ => tracing::debug!(
                error_id = %self.error_id,
                error_code = %self.code,
                category = self.code.category(),
                operation = self.operation.as_deref(),
                "request rejected"
            ),
        }
    }

    fn generate_error_id() -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("err_{:x}_{:x}", timestamp, count)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.code.status(), self.message).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let Ok(value) = HeaderValue::from_str(&self.error_id) {
            response.headers_mut().insert(ERROR_ID_HEADER, value);
        }
        response
    }
}

pub struct ErrorBuilder {
    error: ApiError,
}

impl ErrorBuilder {
    fn new(code: ErrorCode) -> Self {
        Self {
            error: ApiError::new(code, ""),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.error.message = message.into();
        self
    }

    pub fn build(self) -> ApiError {
        self.error
    }
}

impl From<crate::validation::SchemaError> for ApiError {
    fn from(error: crate::validation::SchemaError) -> Self {
        ApiError::schema().message(error.reason()).build()
    }
}

impl From<crate::model::ReceiptError> for ApiError {
    fn from(error: crate::model::ReceiptError) -> Self {
        match error {
            crate::model::ReceiptError::Schema(schema) => schema.into(),
            crate::model::ReceiptError::Decode(decode) => ApiError::internal()
                .message(format!("receipt could not be decoded: {decode}"))
                .build(),
        }
    }
}

impl From<crate::state::StoreError> for ApiError {
    fn from(_: crate::state::StoreError) -> Self {
        ApiError::not_found().build()
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        let code = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorCode::PayloadTooLarge
        } else {
            ErrorCode::InvalidJson
        };
        ApiError::builder(code)
            .message(rejection.body_text())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::SchemaError;

    #[test]
    fn status_codes() {
        assert_eq!(ErrorCode::SchemaError.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ReceiptNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::PayloadTooLarge.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ErrorCode::InternalError.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_builder() {
        let error = ApiError::schema()
            .message("property 'total' is wrong or missing")
            .build();

        assert_eq!(error.code, ErrorCode::SchemaError);
        assert_eq!(error.message, "property 'total' is wrong or missing");
        assert!(error.operation.is_none());
        assert!(error.error_id.starts_with("err_"));
    }

    #[test]
    fn for_operation_attributes_and_counts() {
        let error = ApiError::builder(ErrorCode::PayloadTooLarge)
            .message("length limit exceeded")
            .build()
            .for_operation("process_receipt");

        assert_eq!(error.operation.as_deref(), Some("process_receipt"));
        assert!(
            crate::metrics::METRICS
                .encode()
                .contains("code=\"payload_too_large\"")
        );
    }

    #[test]
    fn error_ids_are_unique() {
        let a = ApiError::internal().build();
        let b = ApiError::internal().build();
        assert_ne!(a.error_id, b.error_id);
    }

    #[test]
    fn schema_error_conversion_keeps_reason() {
        let error = ApiError::from(SchemaError::new("property 'items': can not be empty"));
        assert_eq!(error.code, ErrorCode::SchemaError);
        assert_eq!(error.message, "property 'items': can not be empty");
    }

    #[test]
    fn not_found_message() {
        let error = ApiError::not_found().build();
        assert_eq!(error.message, "No receipt found for that id");
        assert_eq!(error.code.category(), "resource_not_found");
    }

    #[test]
    fn response_carries_error_id_header() {
        let error = ApiError::not_found().build();
        let id = error.error_id.clone();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response
                .headers()
                .get(ERROR_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some(id.as_str())
        );
    }

    #[test]
    fn display_includes_code() {
        let error = ApiError::schema().message("bad").build();
        let display = error.to_string();
        assert!(display.contains("SchemaError"));
        assert!(display.contains("bad"));
    }
}
