//! Live session credential ownership.

use super::clock::{Clock, SystemClock};
use crate::error::SignerResult;
use crate::storage::{SessionCredential, TokenStore};
use arc_swap::ArcSwap;
use cubesigner_client::{CreateTokenRequest, SignerApi};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

/// Lifecycle of the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial credential being loaded or minted
    Bootstrapping,
    /// Credential valid, next refresh scheduled
    Active,
    /// Refresh due and not yet successful
    RefreshPending,
    /// Refresh token expired; no refresh is possible anymore
    ExpiredFatal,
}

impl SessionState {
    /// Whether the session can still serve signing calls.
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::ExpiredFatal)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Active => "active",
            Self::RefreshPending => "refresh_pending",
            Self::ExpiredFatal => "expired_fatal",
        };
        f.write_str(name)
    }
}

/// Long-lived credentials exchanged for a role session at startup.
#[derive(Debug, Clone)]
pub struct BootstrapParams {
    /// Organization owning the role
    pub org_id: String,
    /// Role to mint a session for
    pub role_id: String,
    /// User session token authorizing role token creation
    pub user_token: SecretString,
    /// Purpose recorded on the new session
    pub purpose: String,
}

/// Where the initial credential comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Load from a credential file and persist refreshes back to it
    File(PathBuf),
    /// Mint a new session; refreshes are kept in memory only
    Bootstrap(BootstrapParams),
}

/// Owns the live session credential.
///
/// The refresh task is the only writer; signing calls read snapshots through
/// [`SessionManager::current_bearer_token`] and never see a half-updated
/// credential.
pub struct SessionManager {
    api: Arc<dyn SignerApi>,
    store: TokenStore,
    credential: ArcSwap<SessionCredential>,
    state: watch::Sender<SessionState>,
    refresh_lock: Mutex<()>,
    pub(super) clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Manager for an already obtained credential.
    #[must_use]
    pub fn new(api: Arc<dyn SignerApi>, store: TokenStore, credential: SessionCredential) -> Self {
        Self::with_state(api, store, credential, SessionState::Active)
    }

    fn with_state(
        api: Arc<dyn SignerApi>,
        store: TokenStore,
        credential: SessionCredential,
        initial: SessionState,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            api,
            store,
            credential: ArcSwap::from_pointee(credential),
            state,
            refresh_lock: Mutex::new(()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for refresh scheduling.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Obtain the initial credential and build the manager around it.
    ///
    /// # Errors
    ///
    /// Load errors for [`CredentialSource::File`], remote errors for
    /// [`CredentialSource::Bootstrap`].
    pub async fn start(api: Arc<dyn SignerApi>, source: CredentialSource) -> SignerResult<Self> {
        info!(state = %SessionState::Bootstrapping, "Acquiring session credential");
        let (store, credential) = match source {
            CredentialSource::File(path) => {
                let store = TokenStore::new(path);
                let credential = store.load().await?;
                info!(
                    org_id = credential.org_id(),
                    role_id = credential.role_id(),
                    session_id = credential.session_id(),
                    auth_token_exp = credential.auth_token_exp(),
                    refresh_token_exp = credential.refresh_token_exp(),
                    "Loaded session credential"
                );
                (store, credential)
            }
            CredentialSource::Bootstrap(params) => {
                let credential = Self::bootstrap(api.as_ref(), &params).await?;
                (TokenStore::disabled(), credential)
            }
        };

        let manager = Self::with_state(api, store, credential, SessionState::Bootstrapping);
        manager.set_state(SessionState::Active);
        Ok(manager)
    }

    /// Mint a role session from long-lived user credentials.
    ///
    /// # Errors
    ///
    /// Any remote failure of role token creation.
    #[instrument(skip(api, params), fields(org_id = %params.org_id, role_id = %params.role_id))]
    pub async fn bootstrap(
        api: &dyn SignerApi,
        params: &BootstrapParams,
    ) -> SignerResult<SessionCredential> {
        let request = CreateTokenRequest {
            purpose: params.purpose.clone(),
        };
        let session = api
            .create_role_token(
                &params.org_id,
                &params.role_id,
                &request,
                params.user_token.expose_secret(),
            )
            .await?;

        let credential = SessionCredential::new(&params.org_id, &params.role_id, session);
        info!(
            session_id = credential.session_id(),
            auth_token_exp = credential.auth_token_exp(),
            refresh_token_exp = credential.refresh_token_exp(),
            "Bootstrapped role session"
        );
        Ok(credential)
    }

    /// Bearer token of the live credential.
    #[must_use]
    pub fn current_bearer_token(&self) -> String {
        self.credential.load().bearer_token().to_string()
    }

    /// Organization of the live credential.
    #[must_use]
    pub fn org_id(&self) -> String {
        self.credential.load().org_id().to_string()
    }

    /// Consistent snapshot of the live credential.
    #[must_use]
    pub fn credential(&self) -> Arc<SessionCredential> {
        self.credential.load_full()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(super) fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "Session state changed");
        }
    }

    /// Rotate the session with the refresh triple of the live credential.
    ///
    /// On success the new credential replaces the live one and is persisted;
    /// a persistence failure is logged and does not fail the refresh.
    ///
    /// # Errors
    ///
    /// Any remote failure of the refresh call. The live credential is left
    /// untouched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> SignerResult<Arc<SessionCredential>> {
        let _guard = self.refresh_lock.lock().await;
        self.set_state(SessionState::RefreshPending);

        let current = self.credential.load_full();
        let session = self
            .api
            .refresh_session(current.org_id(), &current.auth_data(), current.bearer_token())
            .await?;

        let refreshed = Arc::new(current.with_session(session));
        self.credential.store(refreshed.clone());
        self.set_state(SessionState::Active);
        info!(
            session_id = refreshed.session_id(),
            auth_token_exp = refreshed.auth_token_exp(),
            refresh_token_exp = refreshed.refresh_token_exp(),
            "Refreshed session"
        );

        if let Err(e) = self.store.save(&refreshed).await {
            warn!(error = %e, "Failed to persist refreshed credential");
        }

        Ok(refreshed)
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("credential", &self.credential.load())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_health() {
        assert!(SessionState::Bootstrapping.is_healthy());
        assert!(SessionState::Active.is_healthy());
        assert!(SessionState::RefreshPending.is_healthy());
        assert!(!SessionState::ExpiredFatal.is_healthy());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::ExpiredFatal.to_string(), "expired_fatal");
        assert_eq!(SessionState::RefreshPending.to_string(), "refresh_pending");
        assert_eq!(SessionState::Bootstrapping.to_string(), "bootstrapping");
    }
}
