//! Error types for the signer sidecar.
//!
//! Remote failures are classified into transport, protocol and decoding
//! errors; credential file failures into load and persistence errors.

use chrono::{DateTime, Utc};
use cubesigner_client::ApiError;
use std::path::PathBuf;
use thiserror::Error;
use tonic::{Code, Status};

/// Signer sidecar errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SignerError {
    /// Network failure reaching the remote signer
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote signer answered with a non-success status
    #[error("Remote signer returned status {status}: {message}")]
    RemoteProtocol {
        /// HTTP status code
        status: u16,
        /// Message from the error body
        message: String,
    },

    /// Malformed hex, base64 or structured data in an otherwise successful response
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Credential file does not exist
    #[error("Credential file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Credential file is not a valid credential document
    #[error("Credential file {} is malformed: {source}", path.display())]
    Malformed {
        /// File path
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// Credential file could not be read or written
    #[error("Credential file {} is not accessible: {source}", path.display())]
    Persistence {
        /// File path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Refresh token deadline passed with no successful refresh
    #[error("Refresh token expired at {expired_at}")]
    CredentialExpired {
        /// Refresh token expiry
        expired_at: DateTime<Utc>,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for sidecar operations.
pub type SignerResult<T> = Result<T, SignerError>;

impl SignerError {
    /// Create a decoding error.
    #[must_use]
    pub fn decoding(msg: impl Into<String>) -> Self {
        Self::Decoding(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential expired error from an epoch-seconds deadline.
    #[must_use]
    pub fn credential_expired(refresh_token_exp: u64) -> Self {
        let expired_at = i64::try_from(refresh_token_exp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self::CredentialExpired { expired_at }
    }

    /// Whether the remote side may succeed if the call is repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::RemoteProtocol { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// gRPC status code for this error.
    #[must_use]
    pub const fn grpc_code(&self) -> Code {
        match self {
            Self::Transport(_) | Self::CredentialExpired { .. } => Code::Unavailable,
            Self::RemoteProtocol { status, .. } => match *status {
                401 => Code::Unauthenticated,
                403 => Code::PermissionDenied,
                404 => Code::NotFound,
                429 => Code::ResourceExhausted,
                _ => Code::Unavailable,
            },
            Self::Decoding(_)
            | Self::NotFound(_)
            | Self::Malformed { .. }
            | Self::Persistence { .. }
            | Self::Config(_) => Code::Internal,
        }
    }

    /// Convert to gRPC status.
    #[must_use]
    pub fn to_status(&self) -> Status {
        Status::new(self.grpc_code(), self.to_string())
    }
}

impl From<ApiError> for SignerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => Self::Transport(e.to_string()),
            ApiError::Status { status, message } => Self::RemoteProtocol { status, message },
            ApiError::Decode(msg) => Self::Decoding(msg),
            ApiError::InvalidConfig(msg) => Self::Config(msg),
        }
    }
}

impl From<SignerError> for Status {
    fn from(err: SignerError) -> Self {
        err.to_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_classification() {
        let err: SignerError = ApiError::status_error(401, "expired").into();
        assert!(matches!(err, SignerError::RemoteProtocol { status: 401, .. }));

        let err: SignerError = ApiError::decode("missing field").into();
        assert!(matches!(err, SignerError::Decoding(_)));

        let err: SignerError = ApiError::InvalidConfig("bad url".to_string()).into();
        assert!(matches!(err, SignerError::Config(_)));
    }

    #[test]
    fn test_retryable_after_conversion() {
        let cases = [
            ApiError::status_error(503, "down"),
            ApiError::status_error(429, "slow down"),
            ApiError::status_error(401, "expired"),
            ApiError::decode("bad json"),
        ];
        for api_err in cases {
            let retryable = api_err.is_retryable();
            let err: SignerError = api_err.into();
            assert_eq!(err.is_retryable(), retryable, "{err}");
        }
        assert!(!SignerError::credential_expired(0).is_retryable());
    }

    #[test]
    fn test_grpc_codes() {
        assert_eq!(SignerError::Transport("refused".into()).grpc_code(), Code::Unavailable);
        assert_eq!(
            SignerError::RemoteProtocol { status: 401, message: String::new() }.grpc_code(),
            Code::Unauthenticated
        );
        assert_eq!(
            SignerError::RemoteProtocol { status: 403, message: String::new() }.grpc_code(),
            Code::PermissionDenied
        );
        assert_eq!(
            SignerError::RemoteProtocol { status: 429, message: String::new() }.grpc_code(),
            Code::ResourceExhausted
        );
        assert_eq!(
            SignerError::RemoteProtocol { status: 500, message: String::new() }.grpc_code(),
            Code::Unavailable
        );
        assert_eq!(SignerError::decoding("odd length").grpc_code(), Code::Internal);
        assert_eq!(SignerError::credential_expired(0).grpc_code(), Code::Unavailable);
    }

    #[test]
    fn test_credential_expired_timestamp() {
        let err = SignerError::credential_expired(1_743_101_574);
        match err {
            SignerError::CredentialExpired { expired_at } => {
                assert_eq!(expired_at.timestamp(), 1_743_101_574);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
