//! Remote signer abstraction.

use crate::error::ApiResult;
use crate::models::{
    AuthData, BlobSignRequest, CreateTokenRequest, KeyInfo, NewSessionResponse, SignResponse,
};
use async_trait::async_trait;

/// Logical operations of the remote signing API.
///
/// Every call takes the `Authorization` header value explicitly: the current
/// session bearer token for key, signing and refresh calls, a long-lived user
/// token for role token creation.
#[async_trait]
pub trait SignerApi: Send + Sync {
    /// Look up a key in an organization.
    async fn get_key(&self, org_id: &str, key_id: &str, auth: &str) -> ApiResult<KeyInfo>;

    /// Sign a raw blob with a key.
    async fn blob_sign(
        &self,
        org_id: &str,
        key_id: &str,
        request: &BlobSignRequest,
        auth: &str,
    ) -> ApiResult<SignResponse>;

    /// Exchange refresh evidence for a new session.
    async fn refresh_session(
        &self,
        org_id: &str,
        auth_data: &AuthData,
        auth: &str,
    ) -> ApiResult<NewSessionResponse>;

    /// Mint a new role session from a user token.
    async fn create_role_token(
        &self,
        org_id: &str,
        role_id: &str,
        request: &CreateTokenRequest,
        auth: &str,
    ) -> ApiResult<NewSessionResponse>;
}
