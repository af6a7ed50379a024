//! CubeSigner API client for the signer sidecar.
//!
//! Exposes the four remote operations the sidecar consumes (key lookup,
//! blob signing, session refresh and role token creation) behind the
//! [`SignerApi`] trait, with a `reqwest` implementation in [`CubeSignerClient`].

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;

pub use client::CubeSignerClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use models::{
    AuthData, BlobSignRequest, CreateTokenRequest, KeyInfo, NewSessionResponse, SessionInfo,
    SignResponse,
};
pub use provider::SignerApi;
