use crate::error::Result;
use crate::remote::{RemoteClient, RemoteOutcome};
use crate::retry::with_renewal;
use bridge_traits::time::Clock;
use core_auth::AuthGateway;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::RenewalPolicy;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

/// Collaborators shared by progress and star reconciliation.
pub struct SyncContext {
    pub remote: Arc<dyn RemoteClient>,
    pub auth: Arc<dyn AuthGateway>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<EventBus>,
    pub renewal_policy: RenewalPolicy,
}

impl SyncContext {
    pub(crate) async fn call<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<RemoteOutcome<T>>>,
    {
        with_renewal(self.auth.as_ref(), self.renewal_policy, operation, call).await
    }

    pub(crate) async fn is_logged_in(&self) -> bool {
        self.auth.is_logged_in().await
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        if self.event_bus.emit(CoreEvent::Sync(event)).is_err() {
            trace!("No subscribers for sync event");
        }
    }
}
