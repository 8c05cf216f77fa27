//! Framework errors
//!
//! Provider code reports problems to Terraform as diagnostics. `TfplugError`
//! only covers failures of the plugin plumbing itself: codec errors, unknown
//! type names and server startup.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Resource type not found: {0}")]
    ResourceNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceNotFound(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("unable to read TLS material {}: {source}", path.display())]
    Certificate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),
}

pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<TfplugError> for tonic::Status {
    fn from(err: TfplugError) -> Self {
        let message = err.to_string();
        match err {
            TfplugError::ResourceNotFound(_) | TfplugError::DataSourceNotFound(_) => {
                tonic::Status::not_found(message)
            }
            TfplugError::DecodingError(_)
            | TfplugError::TypeMismatch { .. }
            | TfplugError::InvalidPath(_)
            | TfplugError::AttributeNotFound(_) => tonic::Status::invalid_argument(message),
            _ => tonic::Status::internal(message),
        }
    }
}
