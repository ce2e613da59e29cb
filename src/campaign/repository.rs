use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Campaign, CampaignPhase};
use crate::error::AppResult;

/// Narrow persistence interface for campaigns.
///
/// `compare_and_set_phase` is the only way a phase reaches the store: the
/// caller names the phase it observed and the write succeeds only if the
/// stored row still carries it, so concurrent callers see exactly one
/// winner.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert(&self, campaign: &Campaign) -> AppResult<()>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Campaign>>;

    /// Persist draft field changes (including the bracket list). Only
    /// touches rows still in DRAFT.
    async fn update_draft(&self, campaign: &Campaign) -> AppResult<()>;

    /// Hard-delete a never-published draft
    async fn delete_draft(&self, id: Uuid) -> AppResult<()>;

    /// Returns true if this caller won the transition
    async fn compare_and_set_phase(
        &self,
        id: Uuid,
        from: CampaignPhase,
        to: CampaignPhase,
    ) -> AppResult<bool>;

    async fn find_in_phase(&self, phase: CampaignPhase) -> AppResult<Vec<Campaign>>;
}
