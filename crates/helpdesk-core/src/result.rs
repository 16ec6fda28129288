use serde::{Deserialize, Serialize};

use crate::error::{HelpdeskError, GENERIC_FAILURE_MESSAGE};

/// Uniform result of a data-access call.
///
/// Services never return `Err`: failures land in `error`, partial successes
/// carry a `warning` next to `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    /// Non-fatal problem alongside a successful result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> ApiResult<T> {
    /// Create a successful result.
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            warning: None,
        }
    }

    /// Create a failed result.
    pub fn failure(error: impl Into<ApiError>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            warning: None,
        }
    }

    /// Attach a warning to the result.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Error message, if the call failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        ApiResult {
            data: self.data.map(f),
            error: self.error,
            warning: self.warning,
        }
    }

    /// Back to a plain `Result`. A success with no data is `Ok(None)`.
    pub fn into_result(self) -> std::result::Result<Option<T>, ApiError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

impl<T> From<crate::error::Result<T>> for ApiResult<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(err),
        }
    }
}

/// Error carried by an [`ApiResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ApiError {
    /// Create a new error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Whether the message came from the backend rather than a generic fallback.
    pub fn is_backend_reported(&self) -> bool {
        !matches!(self.code.as_str(), "NETWORK_ERROR" | "INTERNAL_ERROR")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<HelpdeskError> for ApiError {
    fn from(err: HelpdeskError) -> Self {
        match err {
            HelpdeskError::NotFound(msg) => Self::not_found(msg),
            HelpdeskError::Unauthorized(msg) => Self::unauthorized(msg),
            HelpdeskError::Forbidden(msg) => Self::forbidden(msg),
            HelpdeskError::Validation(msg) => Self::validation(msg),
            HelpdeskError::Backend { message, .. } => Self::new("BACKEND_ERROR", message),
            HelpdeskError::Network(detail) => {
                tracing::warn!(error = %detail, "Network failure");
                Self::new("NETWORK_ERROR", GENERIC_FAILURE_MESSAGE)
            }
            other => {
                tracing::error!(error = %other, "Unexpected failure");
                Self::internal(GENERIC_FAILURE_MESSAGE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = ApiResult::success(42);
        assert!(result.is_success());
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_failure_result() {
        let result: ApiResult<i32> = ApiResult::failure(ApiError::not_found("Ticket not found"));
        assert!(!result.is_success());
        assert!(result.data.is_none());
        assert_eq!(result.error_message(), Some("Ticket not found"));
    }

    #[test]
    fn test_warning_keeps_data() {
        let result = ApiResult::success("client-id").with_warning("Client created but invite failed to send");
        assert!(result.is_success());
        assert_eq!(result.data, Some("client-id"));
        assert!(result.warning.is_some());
    }

    #[test]
    fn test_error_code_mapping() {
        let cases = [
            (HelpdeskError::NotFound("x".into()), "NOT_FOUND"),
            (HelpdeskError::Unauthorized("x".into()), "UNAUTHORIZED"),
            (HelpdeskError::Forbidden("x".into()), "FORBIDDEN"),
            (HelpdeskError::Validation("x".into()), "VALIDATION_ERROR"),
            (HelpdeskError::backend(None, "x"), "BACKEND_ERROR"),
            (HelpdeskError::Network("x".into()), "NETWORK_ERROR"),
            (HelpdeskError::Internal("x".into()), "INTERNAL_ERROR"),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code, code);
        }
    }

    #[test]
    fn test_unexpected_errors_get_generic_message() {
        let err = ApiError::from(HelpdeskError::Network("connection refused".into()));
        assert_eq!(err.message, GENERIC_FAILURE_MESSAGE);
        assert!(!err.is_backend_reported());

        let err = ApiError::from(HelpdeskError::backend(None, "duplicate key value"));
        assert_eq!(err.message, "duplicate key value");
        assert!(err.is_backend_reported());
    }

    #[test]
    fn test_from_result_and_back() {
        let ok: ApiResult<u8> = Ok::<_, HelpdeskError>(1).into();
        assert_eq!(ok.into_result().unwrap(), Some(1));

        let err: ApiResult<u8> = Err(HelpdeskError::Forbidden("no".into())).into();
        assert_eq!(err.into_result().unwrap_err().code, "FORBIDDEN");
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(ApiResult::success(1)).unwrap();
        assert_eq!(json, serde_json::json!({"data": 1}));
    }
}
