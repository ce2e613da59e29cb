use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Pledge, PledgeStatus};
use crate::error::AppResult;

/// Narrow persistence interface for pledges.
///
/// The store - not the service - enforces the one-row-per-(campaign, buyer)
/// invariant: `insert` must fail with `PledgeError::DuplicateCommitment`
/// when any row for the pair already exists, closing the race between
/// concurrent check-then-create calls.
#[async_trait]
pub trait PledgeRepository: Send + Sync {
    async fn insert(&self, pledge: &Pledge) -> AppResult<()>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Pledge>>;

    async fn find_for_buyer(
        &self,
        campaign_id: Uuid,
        buyer_org_id: Uuid,
    ) -> AppResult<Option<Pledge>>;

    async fn update(&self, pledge: &Pledge) -> AppResult<()>;

    async fn find_by_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<Pledge>>;

    async fn find_by_campaign_in_status(
        &self,
        campaign_id: Uuid,
        status: PledgeStatus,
    ) -> AppResult<Vec<Pledge>>;

    /// End-of-grace-period sweep: every PENDING pledge of the campaign
    /// becomes WITHDRAWN. Returns the number of rows transitioned.
    async fn withdraw_pending(&self, campaign_id: Uuid) -> AppResult<u64>;

    /// Sum of pledge quantities in the given statuses
    async fn quantity_in_statuses(
        &self,
        campaign_id: Uuid,
        statuses: &[PledgeStatus],
    ) -> AppResult<i64>;
}
