//! BLS signing against the remote signer.
//!
//! Every call authenticates with the bearer token that is live at call time.
//! No operation retries; failures surface to the caller as-is.

use crate::error::{SignerError, SignerResult};
use crate::session::SessionManager;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cubesigner_client::{BlobSignRequest, SignerApi};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

/// Ciphersuite for ordinary message signatures.
pub const SIGNATURE_CIPHERSUITE: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Ciphersuite for proofs of possession.
pub const PROOF_OF_POSSESSION_CIPHERSUITE: &[u8] =
    b"BLS_POP_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Domain separation tag sent with proof-of-possession requests.
#[must_use]
pub fn proof_of_possession_dst() -> String {
    STANDARD.encode(PROOF_OF_POSSESSION_CIPHERSUITE)
}

/// Signing operations for a single remote key.
pub struct SigningFacade {
    api: Arc<dyn SignerApi>,
    session: Arc<SessionManager>,
    key_id: String,
    public_key: OnceCell<Vec<u8>>,
}

impl SigningFacade {
    /// Facade for `key_id`, authenticated through `session`.
    #[must_use]
    pub fn new(
        api: Arc<dyn SignerApi>,
        session: Arc<SessionManager>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            session,
            key_id: key_id.into(),
            public_key: OnceCell::new(),
        }
    }

    /// Raw public key bytes, fetched once and cached for the process lifetime.
    ///
    /// Concurrent callers on a cold cache share a single remote fetch.
    ///
    /// # Errors
    ///
    /// Remote failures or a malformed hex key. Nothing is cached on failure.
    #[instrument(skip(self), fields(key_id = %self.key_id))]
    pub async fn public_key(&self) -> SignerResult<Vec<u8>> {
        let key = self
            .public_key
            .get_or_try_init(|| async {
                let token = self.session.current_bearer_token();
                let key_info = self
                    .api
                    .get_key(&self.session.org_id(), &self.key_id, &token)
                    .await?;
                let bytes = decode_prefixed_hex(&key_info.public_key)?;
                info!(len = bytes.len(), "Cached public key");
                Ok::<_, SignerError>(bytes)
            })
            .await?;
        Ok(key.clone())
    }

    /// Sign `message` with the ordinary signature ciphersuite.
    ///
    /// # Errors
    ///
    /// Remote failures or a malformed hex signature.
    #[instrument(skip(self, message), fields(key_id = %self.key_id, len = message.len()))]
    pub async fn sign(&self, message: &[u8]) -> SignerResult<Vec<u8>> {
        self.blob_sign(message, None).await
    }

    /// Sign `message` as a proof of possession of the key.
    ///
    /// # Errors
    ///
    /// Remote failures or a malformed hex signature.
    #[instrument(skip(self, message), fields(key_id = %self.key_id, len = message.len()))]
    pub async fn sign_proof_of_possession(&self, message: &[u8]) -> SignerResult<Vec<u8>> {
        self.blob_sign(message, Some(proof_of_possession_dst())).await
    }

    async fn blob_sign(&self, message: &[u8], bls_dst: Option<String>) -> SignerResult<Vec<u8>> {
        let request = BlobSignRequest {
            message_base64: STANDARD.encode(message),
            bls_dst,
        };
        let token = self.session.current_bearer_token();
        let response = self
            .api
            .blob_sign(&self.session.org_id(), &self.key_id, &request, &token)
            .await?;
        decode_prefixed_hex(&response.signature)
    }
}

impl std::fmt::Debug for SigningFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningFacade")
            .field("key_id", &self.key_id)
            .field("public_key_cached", &self.public_key.initialized())
            .finish_non_exhaustive()
    }
}

/// Decode a `0x`-prefixed hex string.
///
/// # Errors
///
/// `Decoding` if the prefix is missing or the rest is not valid hex.
pub fn decode_prefixed_hex(value: &str) -> SignerResult<Vec<u8>> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| SignerError::decoding(format!("missing 0x prefix in {value:?}")))?;
    hex::decode(digits).map_err(|e| SignerError::decoding(format!("invalid hex: {e}")))
}
