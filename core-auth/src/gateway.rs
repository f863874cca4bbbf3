//! The credential contract consumed by the sync core.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::CredentialState;

/// Read access to the current credential plus the ability to renew it.
///
/// The sync core never inspects tokens beyond passing them to the remote
/// service; everything about their lifecycle stays behind this trait.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// The bearer token to send, or `None` when logged out.
    async fn read_credential(&self) -> Option<String>;

    /// Renew the credential the service just rejected as expired and return
    /// once the renewal has finished.
    ///
    /// Safe to call while another renewal is in flight: implementations
    /// coalesce concurrent callers onto one renewal, and return at once when
    /// `rejected` is no longer the current credential.
    async fn renew_credential(&self, rejected: &str) -> Result<()>;

    async fn credential_state(&self) -> CredentialState;

    async fn is_logged_in(&self) -> bool {
        self.credential_state().await.is_logged_in()
    }

    /// The service says no credential exists for this session.
    ///
    /// Ignored while a renewal is in flight.
    async fn mark_logged_out(&self);
}
