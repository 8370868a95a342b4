//! Error types for the remote backend.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while talking to the remote compute service.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("unrecognized asset type {kind:?} for {asset_id}")]
    UnknownAssetType { asset_id: String, kind: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("job {job} failed: {reason}")]
    JobFailed { job: String, reason: String },

    #[error("core error: {0}")]
    Core(#[from] geoclass_core::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;

impl From<CloudError> for geoclass_core::Error {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::Timeout { operation, timeout } => {
                geoclass_core::Error::BackendTimeout { operation, timeout }
            }
            CloudError::UnknownAssetType { asset_id, kind } => {
                geoclass_core::Error::UnrecognizedSource {
                    location: asset_id,
                    reason: format!("asset type {kind:?} is neither IMAGE nor TABLE"),
                }
            }
            CloudError::Core(inner) => inner,
            other => geoclass_core::Error::BackendUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_backend_timeout() {
        let err: geoclass_core::Error = CloudError::Timeout {
            operation: "enumerate".into(),
            timeout: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, geoclass_core::Error::BackendTimeout { .. }));
    }

    #[test]
    fn test_network_maps_to_backend_unavailable() {
        let err: geoclass_core::Error = CloudError::Network("connection refused".into()).into();
        assert!(matches!(err, geoclass_core::Error::BackendUnavailable(_)));
    }
}
