//! Desktop notification sink.
//!
//! Desktop hosts without a toast surface get notifications routed into the
//! tracing pipeline; hosts with a UI supply their own sink.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    notify::{Notification, NotificationKind, NotificationSink},
};
use tracing::{info, warn};

#[derive(Debug, Default, Clone)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<()> {
        match notification.kind {
            NotificationKind::Failed => {
                warn!(target: "notification", text = %notification.message, "failed")
            }
            NotificationKind::Success => {
                info!(target: "notification", text = %notification.message, "success")
            }
            NotificationKind::Info => {
                info!(target: "notification", text = %notification.message, "info")
            }
        }
        Ok(())
    }
}
