//! gRPC Signer service.
//!
//! Thin adapter from the validator-facing RPC surface onto [`SigningFacade`];
//! errors are mapped to gRPC status codes by [`SignerError::to_status`].
//!
//! [`SignerError::to_status`]: crate::error::SignerError::to_status

use crate::proto::signer_server::Signer;
use crate::proto::{
    PublicKeyRequest, PublicKeyResponse, SignProofOfPossessionRequest,
    SignProofOfPossessionResponse, SignRequest, SignResponse,
};
use crate::signing::SigningFacade;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, instrument};

/// Signer service backed by the remote signer.
#[derive(Debug, Clone)]
pub struct SignerService {
    facade: Arc<SigningFacade>,
}

impl SignerService {
    /// Service delegating to `facade`.
    #[must_use]
    pub const fn new(facade: Arc<SigningFacade>) -> Self {
        Self { facade }
    }
}

#[tonic::async_trait]
impl Signer for SignerService {
    #[instrument(skip_all)]
    async fn public_key(
        &self,
        _request: Request<PublicKeyRequest>,
    ) -> Result<Response<PublicKeyResponse>, Status> {
        let public_key = self.facade.public_key().await.map_err(|e| {
            error!(error = %e, "PublicKey failed");
            e.to_status()
        })?;

        Ok(Response::new(PublicKeyResponse { public_key }))
    }

    #[instrument(skip_all)]
    async fn sign(&self, request: Request<SignRequest>) -> Result<Response<SignResponse>, Status> {
        let req = request.into_inner();
        let signature = self.facade.sign(&req.message).await.map_err(|e| {
            error!(error = %e, "Sign failed");
            e.to_status()
        })?;

        Ok(Response::new(SignResponse { signature }))
    }

    #[instrument(skip_all)]
    async fn sign_proof_of_possession(
        &self,
        request: Request<SignProofOfPossessionRequest>,
    ) -> Result<Response<SignProofOfPossessionResponse>, Status> {
        let req = request.into_inner();
        let signature = self
            .facade
            .sign_proof_of_possession(&req.message)
            .await
            .map_err(|e| {
                error!(error = %e, "SignProofOfPossession failed");
                e.to_status()
            })?;

        Ok(Response::new(SignProofOfPossessionResponse { signature }))
    }
}
