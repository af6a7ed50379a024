//! CubeSigner HTTP client.

use crate::{
    config::ClientConfig,
    error::{ApiError, ApiResult},
    models::{
        AuthData, BlobSignRequest, CreateTokenRequest, ErrorResponse, KeyInfo,
        NewSessionResponse, SignResponse,
    },
    provider::SignerApi,
};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

/// CubeSigner API client over HTTPS.
#[derive(Debug, Clone)]
pub struct CubeSignerClient {
    base: Url,
    http: Client,
}

impl CubeSignerClient {
    /// Create a new client.
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let base = Url::parse(&config.endpoint)
            .map_err(|e| ApiError::InvalidConfig(format!("endpoint {}: {e}", config.endpoint)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidConfig(format!(
                "endpoint {} cannot be a base URL",
                config.endpoint
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { base, http })
    }

    /// Build an endpoint URL, percent-encoding each path segment.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidConfig(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, auth: &str) -> RequestBuilder {
        self.http.request(method, url).header(AUTHORIZATION, auth)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            let err = ApiError::status_error(status.as_u16(), message);
            warn!(error = %err, retryable = err.is_retryable(), "CubeSigner request failed");
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::decode(e.to_string()))
    }
}

#[async_trait]
impl SignerApi for CubeSignerClient {
    #[instrument(skip(self, auth))]
    async fn get_key(&self, org_id: &str, key_id: &str, auth: &str) -> ApiResult<KeyInfo> {
        let url = self.url(&["v0", "org", org_id, "keys", key_id])?;
        debug!(%url, "Getting key");
        Self::send(self.request(Method::GET, url, auth)).await
    }

    #[instrument(skip(self, request, auth))]
    async fn blob_sign(
        &self,
        org_id: &str,
        key_id: &str,
        request: &BlobSignRequest,
        auth: &str,
    ) -> ApiResult<SignResponse> {
        let url = self.url(&["v1", "org", org_id, "blob", "sign", key_id])?;
        debug!(pop = request.bls_dst.is_some(), "Signing blob");
        Self::send(self.request(Method::POST, url, auth).json(request)).await
    }

    #[instrument(skip(self, auth_data, auth))]
    async fn refresh_session(
        &self,
        org_id: &str,
        auth_data: &AuthData,
        auth: &str,
    ) -> ApiResult<NewSessionResponse> {
        let url = self.url(&["v1", "org", org_id, "token", "refresh"])?;
        debug!(epoch = auth_data.epoch_num, "Refreshing session");
        Self::send(self.request(Method::PATCH, url, auth).json(auth_data)).await
    }

    #[instrument(skip(self, request, auth))]
    async fn create_role_token(
        &self,
        org_id: &str,
        role_id: &str,
        request: &CreateTokenRequest,
        auth: &str,
    ) -> ApiResult<NewSessionResponse> {
        let url = self.url(&["v0", "org", org_id, "roles", role_id, "tokens"])?;
        debug!(purpose = %request.purpose, "Creating role token");
        Self::send(self.request(Method::POST, url, auth).json(request)).await
    }
}
