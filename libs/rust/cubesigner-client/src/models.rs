//! Request and response bodies of the CubeSigner API.

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// Refresh evidence sent to the session refresh endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthData {
    /// Session epoch
    pub epoch_num: i32,
    /// Token of the current epoch
    pub epoch_token: String,
    /// Session refresh token
    pub other_token: String,
}

impl fmt::Debug for AuthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthData")
            .field("epoch_num", &self.epoch_num)
            .field("epoch_token", &REDACTED)
            .field("other_token", &REDACTED)
            .finish()
    }
}

/// Session metadata carried by every issued session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Auth token half of the bearer token
    pub auth_token: String,
    /// Expiry of `auth_token`, epoch seconds
    pub auth_token_exp: u64,
    /// Session epoch, advanced on every refresh
    pub epoch: i32,
    /// Token of the current epoch
    pub epoch_token: String,
    /// Refresh token presented as `other_token`
    pub refresh_token: String,
    /// Expiry of `refresh_token`, epoch seconds
    pub refresh_token_exp: u64,
    /// Session identifier
    pub session_id: String,
}

impl fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInfo")
            .field("auth_token", &REDACTED)
            .field("auth_token_exp", &self.auth_token_exp)
            .field("epoch", &self.epoch)
            .field("epoch_token", &REDACTED)
            .field("refresh_token", &REDACTED)
            .field("refresh_token_exp", &self.refresh_token_exp)
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl SessionInfo {
    /// Refresh evidence for this session.
    #[must_use]
    pub fn auth_data(&self) -> AuthData {
        AuthData {
            epoch_num: self.epoch,
            epoch_token: self.epoch_token.clone(),
            other_token: self.refresh_token.clone(),
        }
    }
}

/// Session issued by token refresh or role token creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSessionResponse {
    /// Bearer token for the `Authorization` header
    pub token: String,
    /// Opaque refresh token blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Session expiry, epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,
    /// Purpose recorded when the session was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Expiries and refresh evidence
    pub session_info: SessionInfo,
}

impl fmt::Debug for NewSessionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSessionResponse")
            .field("token", &REDACTED)
            .field("expiration", &self.expiration)
            .field("purpose", &self.purpose)
            .field("session_info", &self.session_info)
            .finish_non_exhaustive()
    }
}

/// Key lookup response. Only the public key is modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// `0x`-prefixed hex encoding of the public key
    pub public_key: String,
}

/// Blob signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSignRequest {
    /// Message to sign, base64
    pub message_base64: String,
    /// Base64 BLS domain separation tag; the signer's default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bls_dst: Option<String>,
}

/// Signing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    /// `0x`-prefixed hex encoding of the signature
    pub signature: String,
}

/// Role token creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    /// Free-form purpose recorded on the session
    pub purpose: String,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure description
    #[serde(default)]
    pub message: Option<String>,
}
