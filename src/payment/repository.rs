use async_trait::async_trait;
use uuid::Uuid;

use super::models::{PaymentIntent, PaymentIntentStatus};
use crate::error::AppResult;

/// Narrow persistence interface for payment intents.
///
/// `insert` must fail with `PaymentError::DuplicateIntent` when the pledge
/// already has an intent - the storage-level backstop against double
/// charging. `compare_and_set_status` writes the new status (and retry
/// count) only if the row still carries the expected status.
#[async_trait]
pub trait PaymentIntentRepository: Send + Sync {
    async fn insert(&self, intent: &PaymentIntent) -> AppResult<()>;

    async fn find(&self, id: Uuid) -> AppResult<Option<PaymentIntent>>;

    async fn find_by_pledge(&self, pledge_id: Uuid) -> AppResult<Option<PaymentIntent>>;

    /// Returns true if this caller won the transition
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expect: PaymentIntentStatus,
        next: PaymentIntentStatus,
        retry_count: i32,
    ) -> AppResult<bool>;

    /// All intents in FAILED_RETRY_1 or FAILED_RETRY_2 with retry count
    /// below the cap, across all campaigns
    async fn find_retryable(&self, max_retries: i32) -> AppResult<Vec<PaymentIntent>>;

    async fn find_by_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<PaymentIntent>>;

    async fn find_by_buyer(&self, buyer_org_id: Uuid) -> AppResult<Vec<PaymentIntent>>;
}
