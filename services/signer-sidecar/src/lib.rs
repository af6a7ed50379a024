//! CubeSigner signer sidecar.
//!
//! Serves the validator `Signer` gRPC interface (public key, message signature,
//! proof of possession) on top of a remote CubeSigner key. The sidecar never
//! holds key material; it owns the role session used to reach the remote
//! signer and keeps it refreshed ahead of expiry.

pub mod config;
pub mod error;
pub mod grpc;
pub mod observability;
pub mod session;
pub mod shutdown;
pub mod signing;
pub mod storage;

/// Generated protobuf code for the `signer` package.
#[allow(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
pub mod proto {
    tonic::include_proto!("signer");
}

pub use config::{Args, Config, ConfigError};
pub use error::{SignerError, SignerResult};
pub use grpc::SignerService;
pub use session::{SessionManager, SessionState};
pub use signing::SigningFacade;
