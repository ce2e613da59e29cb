use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppResult;
use crate::payment::models::PaymentIntent;

/// Normalized outcome reported back by the payment gateway integration.
/// The core never parses gateway-specific payloads; the integration
/// reduces every webhook to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Succeeded,
    Failed,
    Pending,
}

/// Payment gateway collaborator. The core only asks it to open a charge
/// attempt; the eventual disposition arrives later as a `GatewayOutcome`
/// through `PaymentService::apply_gateway_outcome`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, intent: &PaymentIntent) -> AppResult<()>;
}

/// Stand-in adapter for deployments without a wired gateway - records the
/// checkout request in the log and waits for a manually injected outcome.
pub struct LoggingGateway;

#[async_trait]
impl PaymentGateway for LoggingGateway {
    async fn create_checkout(&self, intent: &PaymentIntent) -> AppResult<()> {
        info!(
            intent_id = %intent.id,
            amount = %intent.amount,
            "checkout requested"
        );
        Ok(())
    }
}
