//! Proactive session refresh.

use super::manager::{SessionManager, SessionState};
use crate::error::{SignerError, SignerResult};
use crate::shutdown::ShutdownSignal;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Refresh this long before the auth token expires.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(1);

/// Next step of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// Sleep, then refresh
    Wait(Duration),
    /// Refresh token has expired; no refresh is possible
    Expired,
}

/// Decide when to refresh a credential with the given expiries (epoch seconds).
///
/// An auth token already inside the margin is refreshed at once as long as the
/// refresh token is still valid.
#[must_use]
pub fn plan_refresh(now: DateTime<Utc>, auth_token_exp: u64, refresh_token_exp: u64) -> RefreshPlan {
    let now_ms = now.timestamp_millis();
    let margin_ms = i64::try_from(REFRESH_MARGIN.as_millis()).unwrap_or(i64::MAX);

    let wait_ms = epoch_millis(auth_token_exp)
        .saturating_sub(now_ms)
        .saturating_sub(margin_ms);
    if wait_ms >= 0 {
        return RefreshPlan::Wait(Duration::from_millis(wait_ms.unsigned_abs()));
    }

    if epoch_millis(refresh_token_exp).saturating_sub(now_ms) < 0 {
        RefreshPlan::Expired
    } else {
        RefreshPlan::Wait(Duration::ZERO)
    }
}

fn epoch_millis(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}

impl SessionManager {
    /// Keep the session alive until cancelled or the refresh token expires.
    ///
    /// Failed refreshes are retried immediately, without backoff, until the
    /// refresh token deadline passes.
    ///
    /// # Errors
    ///
    /// `CredentialExpired` once no refresh is possible anymore; the state is
    /// then [`SessionState::ExpiredFatal`]. Cancellation returns `Ok`.
    pub async fn schedule_refresh(&self, mut shutdown: ShutdownSignal) -> SignerResult<()> {
        info!("Session refresh scheduler started");

        loop {
            if shutdown.is_shutdown() {
                info!("Session refresh scheduler cancelled");
                return Ok(());
            }

            let credential = self.credential();
            let wait = match plan_refresh(
                self.clock.now(),
                credential.auth_token_exp(),
                credential.refresh_token_exp(),
            ) {
                RefreshPlan::Wait(wait) => wait,
                RefreshPlan::Expired => {
                    self.set_state(SessionState::ExpiredFatal);
                    let err = SignerError::credential_expired(credential.refresh_token_exp());
                    error!(
                        session_id = credential.session_id(),
                        error = %err,
                        "Session can no longer be refreshed"
                    );
                    return Err(err);
                }
            };

            debug!(wait_ms = wait.as_millis(), "Next session refresh scheduled");
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Session refresh scheduler cancelled");
                    return Ok(());
                }
                () = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = self.refresh().await {
                warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    "Session refresh failed, retrying"
                );
                tokio::task::yield_now().await;
            }
        }
    }
}
