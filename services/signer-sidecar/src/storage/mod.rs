//! Session credential persistence.

pub mod credential;
pub mod token_store;

pub use credential::{CredentialCodec, SessionCredential};
pub use token_store::TokenStore;
