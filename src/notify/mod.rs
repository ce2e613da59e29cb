use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppResult;

/// Events handed to the notification collaborator for delivery
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    CampaignLocked {
        campaign_id: Uuid,
    },
    PledgeCommitted {
        campaign_id: Uuid,
        pledge_id: Uuid,
        buyer_org_id: Uuid,
    },
    PaymentSucceeded {
        intent_id: Uuid,
        buyer_org_id: Uuid,
    },
    PaymentFailed {
        intent_id: Uuid,
        buyer_org_id: Uuid,
        retry_count: i32,
    },
    SentToAr {
        intent_id: Uuid,
        buyer_org_id: Uuid,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: NotificationEvent) -> AppResult<()>;
}

/// Fire-and-forget dispatch: delivery failure must never roll back the
/// state change that produced the event.
pub async fn emit(notifier: &dyn Notifier, event: NotificationEvent) {
    if let Err(e) = notifier.publish(event).await {
        warn!("notification delivery failed: {e}");
    }
}

/// Default adapter - logs events through tracing
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn publish(&self, event: NotificationEvent) -> AppResult<()> {
        let payload = serde_json::to_value(&event).unwrap_or_default();
        info!(%payload, "notification emitted");
        Ok(())
    }
}
