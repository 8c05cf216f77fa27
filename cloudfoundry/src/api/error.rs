use thiserror::Error;

use super::common::CfErrorDetail;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("CF API returned error (HTTP {status}): {}", format_errors(.errors, .message))]
    ApiError {
        status: u16,
        message: String,
        errors: Vec<CfErrorDetail>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Job {guid} failed: {}", format_errors(.errors, "no details"))]
    JobFailed {
        guid: String,
        errors: Vec<CfErrorDetail>,
    },

    #[error("Operation {operation} failed with state {state}")]
    OperationFailed { operation: String, state: String },

    #[error("Timed out after {seconds} seconds waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for HTTP 404 and for CF-ResourceNotFound errors
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::ApiError { status, errors, .. } => {
                *status == 404 || errors.iter().any(|e| e.title == "CF-ResourceNotFound")
            }
            _ => false,
        }
    }
}

fn format_errors(errors: &[CfErrorDetail], fallback: &str) -> String {
    if errors.is_empty() {
        return fallback.to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
