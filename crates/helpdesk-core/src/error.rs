use thiserror::Error;

/// Core error type for helpdesk operations.
#[derive(Error, Debug)]
pub enum HelpdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(String),

    /// An error reported by the backend itself (validation, constraint, policy).
    #[error("{message}")]
    Backend {
        code: Option<String>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HelpdeskError {
    /// Create a backend-reported error.
    pub fn backend(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code,
            message: message.into(),
        }
    }

    /// Whether the backend (rather than the transport or local code) produced this error.
    pub fn is_backend_reported(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. }
                | Self::NotFound(_)
                | Self::Unauthorized(_)
                | Self::Forbidden(_)
                | Self::Validation(_)
        )
    }

    /// The message a user should see, without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend { message, .. } => message.clone(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Validation(msg) => msg.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Message shown for network and unexpected failures.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

impl From<serde_json::Error> for HelpdeskError {
    fn from(e: serde_json::Error) -> Self {
        HelpdeskError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for HelpdeskError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            HelpdeskError::Serialization(e.to_string())
        } else {
            HelpdeskError::Network(e.to_string())
        }
    }
}

/// Result type alias using HelpdeskError.
pub type Result<T> = std::result::Result<T, HelpdeskError>;
