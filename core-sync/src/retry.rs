//! # Renew and Retry
//!
//! Runs one logical remote call under the credential protocol:
//!
//! - `Ok` ends the loop with the payload.
//! - `Expired` renews the credential through the [`AuthGateway`] and
//!   re-issues the same call, up to [`RenewalPolicy::max_renewals`] times.
//! - `MissingCredential` asks the gateway to mark the session logged out and
//!   fails with [`SyncError::CredentialMissing`]. The gateway ignores that
//!   request while a renewal is in flight.
//! - `Failed` fails with [`SyncError::Remote`].
//!
//! Only the remote call is repeated. Local reads and writes around it happen
//! once per logical operation.

use crate::error::{Result, SyncError};
use crate::remote::RemoteOutcome;
use core_auth::AuthGateway;
use core_runtime::RenewalPolicy;
use std::future::Future;
use tracing::{debug, warn};

/// Attempt bookkeeping for one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    operation: &'static str,
    attempts: u32,
    renewals: u32,
    max_renewals: u32,
}

impl RetryState {
    pub fn new(operation: &'static str, policy: RenewalPolicy) -> Self {
        Self {
            operation,
            attempts: 0,
            renewals: 0,
            max_renewals: policy.max_renewals,
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn renewals(&self) -> u32 {
        self.renewals
    }

    pub fn can_renew(&self) -> bool {
        self.renewals < self.max_renewals
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    fn record_renewal(&mut self) {
        self.renewals += 1;
    }

    fn exhausted(&self) -> SyncError {
        SyncError::RetryExhausted {
            operation: self.operation.to_string(),
            attempts: self.attempts,
        }
    }
}

/// Run `call` with the current credential until it yields a final outcome.
///
/// `call` receives the bearer token for each attempt. A logged-out gateway
/// (no credential to read) is treated like a `MissingCredential` answer
/// without contacting the remote.
pub async fn with_renewal<T, F, Fut>(
    auth: &dyn AuthGateway,
    policy: RenewalPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<RemoteOutcome<T>>>,
{
    let mut state = RetryState::new(operation, policy);

    loop {
        let attempt = state.begin_attempt();

        let Some(token) = auth.read_credential().await else {
            debug!(operation, attempt, "No credential to send");
            auth.mark_logged_out().await;
            return Err(SyncError::CredentialMissing);
        };

        match call(token.clone()).await? {
            RemoteOutcome::Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Remote call succeeded after renewal");
                }
                return Ok(value);
            }
            RemoteOutcome::Expired => {
                if !state.can_renew() {
                    warn!(
                        operation,
                        attempt,
                        renewals = state.renewals(),
                        "Credential still expired, giving up"
                    );
                    return Err(state.exhausted());
                }

                debug!(operation, attempt, "Credential expired, renewing");
                state.record_renewal();
                auth.renew_credential(&token).await?;
            }
            RemoteOutcome::MissingCredential => {
                debug!(operation, attempt, "No credential on the remote");
                auth.mark_logged_out().await;
                return Err(SyncError::CredentialMissing);
            }
            RemoteOutcome::Failed(detail) => {
                return Err(SyncError::Remote(detail));
            }
        }
    }
}
