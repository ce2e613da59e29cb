use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{PaymentIntent, PaymentIntentStatus, MAX_RETRIES};
use super::repository::PaymentIntentRepository;
use crate::error::{AppError, AppResult, PaymentError};
use crate::gateway::{GatewayOutcome, PaymentGateway};
use crate::notify::{emit, NotificationEvent, Notifier};

/// Manual disposition of an intent that was handed to AR collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArDisposition {
    Collected,
    WrittenOff,
}

/// Drives each payment intent through the transition table, from checkout
/// creation to final disposition.
pub struct PaymentService {
    intents: Arc<dyn PaymentIntentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl PaymentService {
    pub fn new(
        intents: Arc<dyn PaymentIntentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            intents,
            gateway,
            notifier,
        }
    }

    async fn load(&self, intent_id: Uuid) -> AppResult<PaymentIntent> {
        self.intents
            .find(intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment intent {intent_id} not found")))
    }

    /// Validate against the transition table, then compare-and-set. A lost
    /// race surfaces as an invalid transition naming the state the row
    /// actually reached.
    async fn transition(
        &self,
        intent: &PaymentIntent,
        to: PaymentIntentStatus,
        retry_count: i32,
    ) -> AppResult<PaymentIntent> {
        PaymentIntentStatus::ensure_transition(intent.status, to)?;

        let won = self
            .intents
            .compare_and_set_status(intent.id, intent.status, to, retry_count)
            .await?;
        if !won {
            let current = self.load(intent.id).await?;
            return Err(PaymentError::InvalidTransition {
                from: current.status,
                to,
            }
            .into());
        }

        Ok(PaymentIntent {
            status: to,
            retry_count,
            updated_at: Utc::now(),
            ..intent.clone()
        })
    }

    /// Record a failed attempt: PROCESSING -> FAILED_RETRY_n where n is
    /// the incremented retry count.
    async fn record_failure(&self, intent: &PaymentIntent) -> AppResult<PaymentIntent> {
        let attempt = intent.retry_count + 1;
        let next = PaymentIntentStatus::failed_for_attempt(attempt).ok_or(
            PaymentError::RetryLimitExceeded {
                intent: intent.id,
                max: MAX_RETRIES,
            },
        )?;

        let updated = self.transition(intent, next, attempt).await?;
        warn!(
            intent_id = %intent.id,
            attempt,
            "payment attempt failed"
        );
        emit(
            self.notifier.as_ref(),
            NotificationEvent::PaymentFailed {
                intent_id: intent.id,
                buyer_org_id: intent.buyer_org_id,
                retry_count: attempt,
            },
        )
        .await;
        Ok(updated)
    }

    /// PENDING -> PROCESSING on checkout creation. If the gateway rejects
    /// the checkout outright the failure is recorded through the normal
    /// PROCESSING -> FAILED_RETRY_n edge so the intent stays collectable.
    pub async fn begin_collection(&self, intent_id: Uuid) -> AppResult<PaymentIntent> {
        let intent = self.load(intent_id).await?;
        let processing = self
            .transition(&intent, PaymentIntentStatus::Processing, intent.retry_count)
            .await?;

        if let Err(e) = self.gateway.create_checkout(&processing).await {
            self.record_failure(&processing).await?;
            return Err(e);
        }

        info!(intent_id = %intent_id, "collection started");
        Ok(processing)
    }

    /// Apply the gateway's normalized outcome for an intent
    pub async fn apply_gateway_outcome(
        &self,
        intent_id: Uuid,
        outcome: GatewayOutcome,
    ) -> AppResult<PaymentIntent> {
        let intent = self.load(intent_id).await?;

        match outcome {
            GatewayOutcome::Pending => Ok(intent),
            GatewayOutcome::Succeeded => {
                let updated = self
                    .transition(&intent, PaymentIntentStatus::Succeeded, intent.retry_count)
                    .await?;
                info!(intent_id = %intent_id, amount = %intent.amount, "payment succeeded");
                emit(
                    self.notifier.as_ref(),
                    NotificationEvent::PaymentSucceeded {
                        intent_id: intent.id,
                        buyer_org_id: intent.buyer_org_id,
                    },
                )
                .await;
                Ok(updated)
            }
            GatewayOutcome::Failed => self.record_failure(&intent).await,
        }
    }

    /// Drive a failed intent back to PROCESSING for another attempt.
    ///
    /// Exceeding the retry cap and retrying from a non-retryable status
    /// are different conditions and surface as distinct errors.
    pub async fn retry(&self, intent_id: Uuid) -> AppResult<PaymentIntent> {
        let intent = self.load(intent_id).await?;

        if intent.retry_count >= MAX_RETRIES {
            return Err(PaymentError::RetryLimitExceeded {
                intent: intent.id,
                max: MAX_RETRIES,
            }
            .into());
        }
        if !intent.status.is_retryable() {
            return Err(PaymentError::NotRetryable {
                intent: intent.id,
                status: intent.status,
            }
            .into());
        }

        let processing = self
            .transition(&intent, PaymentIntentStatus::Processing, intent.retry_count)
            .await?;

        if let Err(e) = self.gateway.create_checkout(&processing).await {
            self.record_failure(&processing).await?;
            return Err(e);
        }

        info!(
            intent_id = %intent_id,
            retry_count = processing.retry_count,
            "payment retry started"
        );
        Ok(processing)
    }

    /// Manual-collection handoff: FAILED_RETRY_3 with the cap exhausted
    /// moves to SENT_TO_AR. Never automatic.
    pub async fn escalate_to_ar(&self, intent_id: Uuid) -> AppResult<PaymentIntent> {
        let intent = self.load(intent_id).await?;

        if intent.retry_count < MAX_RETRIES {
            return Err(PaymentError::NotRetryable {
                intent: intent.id,
                status: intent.status,
            }
            .into());
        }

        let updated = self
            .transition(&intent, PaymentIntentStatus::SentToAr, intent.retry_count)
            .await?;
        info!(intent_id = %intent_id, "escalated to AR collection");
        emit(
            self.notifier.as_ref(),
            NotificationEvent::SentToAr {
                intent_id: intent.id,
                buyer_org_id: intent.buyer_org_id,
            },
        )
        .await;
        Ok(updated)
    }

    /// Close out an AR-escalated intent
    pub async fn resolve_ar(
        &self,
        intent_id: Uuid,
        disposition: ArDisposition,
    ) -> AppResult<PaymentIntent> {
        let intent = self.load(intent_id).await?;
        let target = match disposition {
            ArDisposition::Collected => PaymentIntentStatus::CollectedViaAr,
            ArDisposition::WrittenOff => PaymentIntentStatus::WrittenOff,
        };
        let updated = self.transition(&intent, target, intent.retry_count).await?;
        info!(intent_id = %intent_id, status = ?target, "AR collection resolved");
        Ok(updated)
    }

    pub async fn history_for_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<PaymentIntent>> {
        self.intents.find_by_campaign(campaign_id).await
    }

    pub async fn history_for_buyer(&self, buyer_org_id: Uuid) -> AppResult<Vec<PaymentIntent>> {
        self.intents.find_by_buyer(buyer_org_id).await
    }
}
