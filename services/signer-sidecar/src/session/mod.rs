//! Session credential lifecycle: acquisition, refresh scheduling and access.

pub mod clock;
pub mod manager;
pub mod scheduler;

pub use clock::{Clock, SystemClock};
pub use manager::{BootstrapParams, CredentialSource, SessionManager, SessionState};
pub use scheduler::{plan_refresh, RefreshPlan, REFRESH_MARGIN};
