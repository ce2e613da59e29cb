use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::models::{Campaign, CampaignPhase, DiscountBracket};
use super::repository::CampaignRepository;
use crate::error::{AppError, AppResult, CampaignError, PledgeError};
use crate::notify::{emit, NotificationEvent, Notifier};
use crate::org::OrganizationRepository;
use crate::pledge::repository::PledgeRepository;
use crate::pricing::{self, BracketResolution};
use crate::settlement::SettlementGenerator;

/// Request to create a new draft campaign
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignDraft {
    pub supplier_org_id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub target_quantity: i64,
    pub brackets: Vec<DiscountBracket>,
}

/// Partial update applied to a draft campaign
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub target_quantity: Option<i64>,
    pub brackets: Option<Vec<DiscountBracket>>,
}

/// Outcome of one phase-advancement run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PhaseAdvanceReport {
    pub entered_grace: u64,
    pub locked: u64,
}

/// Owns the campaign phase lifecycle. The transition table on
/// `CampaignPhase` is checked before every mutation; the store's
/// compare-and-set makes concurrent callers resolve to one winner.
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    pledges: Arc<dyn PledgeRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    settlement: Arc<SettlementGenerator>,
    notifier: Arc<dyn Notifier>,
    grace_window: chrono::Duration,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        pledges: Arc<dyn PledgeRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        settlement: Arc<SettlementGenerator>,
        notifier: Arc<dyn Notifier>,
        grace_window: chrono::Duration,
    ) -> Self {
        Self {
            campaigns,
            pledges,
            organizations,
            settlement,
            notifier,
            grace_window,
        }
    }

    async fn load(&self, campaign_id: Uuid) -> AppResult<Campaign> {
        self.campaigns
            .find(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {campaign_id} not found")))
    }

    fn ensure_owner(campaign: &Campaign, supplier_org_id: Uuid) -> AppResult<()> {
        if campaign.supplier_org_id != supplier_org_id {
            return Err(CampaignError::AccessDenied(supplier_org_id).into());
        }
        Ok(())
    }

    fn normalize_brackets(mut brackets: Vec<DiscountBracket>) -> AppResult<Vec<DiscountBracket>> {
        brackets.sort_by_key(|b| b.position);
        if !brackets.is_empty() {
            pricing::validate_partition(&brackets)?;
        }
        Ok(brackets)
    }

    // ========== DRAFT LIFECYCLE ==========

    pub async fn create_draft(&self, draft: CampaignDraft) -> AppResult<Campaign> {
        let supplier = self
            .organizations
            .find(draft.supplier_org_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Organization {} not found", draft.supplier_org_id))
            })?;
        if !supplier.active {
            return Err(PledgeError::OrganizationNotActive(supplier.id).into());
        }

        let brackets = Self::normalize_brackets(draft.brackets)?;
        let campaign = Campaign::new(
            draft.supplier_org_id,
            draft.title,
            draft.description,
            draft.starts_at,
            draft.ends_at,
            draft.target_quantity,
            brackets,
        );
        self.campaigns.insert(&campaign).await?;
        info!(campaign_id = %campaign.id, "draft campaign created");
        Ok(campaign)
    }

    pub async fn update_draft(
        &self,
        campaign_id: Uuid,
        supplier_org_id: Uuid,
        update: CampaignUpdate,
    ) -> AppResult<Campaign> {
        let mut campaign = self.load(campaign_id).await?;
        Self::ensure_owner(&campaign, supplier_org_id)?;
        if !campaign.is_draft() {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "update_draft",
            }
            .into());
        }

        if let Some(title) = update.title {
            campaign.title = title;
        }
        if let Some(description) = update.description {
            campaign.description = description;
        }
        if let Some(starts_at) = update.starts_at {
            campaign.starts_at = starts_at;
        }
        if let Some(ends_at) = update.ends_at {
            campaign.ends_at = ends_at;
        }
        if let Some(target_quantity) = update.target_quantity {
            campaign.target_quantity = target_quantity;
        }
        if let Some(brackets) = update.brackets {
            campaign.brackets = Self::normalize_brackets(brackets)?;
        }
        campaign.updated_at = Utc::now();

        self.campaigns.update_draft(&campaign).await?;
        Ok(campaign)
    }

    /// Hard deletion is reserved for never-published drafts
    pub async fn delete_draft(&self, campaign_id: Uuid, supplier_org_id: Uuid) -> AppResult<()> {
        let campaign = self.load(campaign_id).await?;
        Self::ensure_owner(&campaign, supplier_org_id)?;
        if !campaign.is_draft() {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "delete_draft",
            }
            .into());
        }
        self.campaigns.delete_draft(campaign_id).await?;
        info!(campaign_id = %campaign_id, "draft campaign deleted");
        Ok(())
    }

    // ========== PHASE TRANSITIONS ==========

    /// DRAFT -> ACTIVE. Requires a valid, non-empty bracket partition and
    /// a future end date.
    pub async fn publish(
        &self,
        campaign_id: Uuid,
        supplier_org_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Campaign> {
        let campaign = self.load(campaign_id).await?;
        Self::ensure_owner(&campaign, supplier_org_id)?;
        if !campaign.is_draft() {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "publish_campaign",
            }
            .into());
        }
        pricing::validate_partition(&campaign.brackets)?;
        if campaign.ends_at <= now {
            return Err(CampaignError::EndDateInPast.into());
        }

        self.transition(&campaign, CampaignPhase::Active, "publish_campaign")
            .await?;
        info!(campaign_id = %campaign_id, "campaign published");
        Ok(Campaign {
            phase: CampaignPhase::Active,
            updated_at: Utc::now(),
            ..campaign
        })
    }

    /// Administrative cancellation from any pre-lock phase. No settlement
    /// occurs.
    pub async fn cancel(&self, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self.load(campaign_id).await?;
        if !matches!(
            campaign.phase,
            CampaignPhase::Draft | CampaignPhase::Active | CampaignPhase::GracePeriod
        ) {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "cancel_campaign",
            }
            .into());
        }

        self.transition(&campaign, CampaignPhase::Cancelled, "cancel_campaign")
            .await?;
        info!(campaign_id = %campaign_id, "campaign cancelled");
        Ok(Campaign {
            phase: CampaignPhase::Cancelled,
            updated_at: Utc::now(),
            ..campaign
        })
    }

    /// LOCKED -> DONE once fulfillment and collection have concluded
    pub async fn complete(&self, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self.load(campaign_id).await?;
        if campaign.phase != CampaignPhase::Locked {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "complete_campaign",
            }
            .into());
        }

        self.transition(&campaign, CampaignPhase::Done, "complete_campaign")
            .await?;
        Ok(Campaign {
            phase: CampaignPhase::Done,
            updated_at: Utc::now(),
            ..campaign
        })
    }

    async fn transition(
        &self,
        campaign: &Campaign,
        to: CampaignPhase,
        operation: &'static str,
    ) -> AppResult<()> {
        CampaignPhase::ensure_transition(campaign.phase, to)?;
        let won = self
            .campaigns
            .compare_and_set_phase(campaign.id, campaign.phase, to)
            .await?;
        if !won {
            let current = self.load(campaign.id).await?;
            return Err(CampaignError::PhaseViolation {
                phase: current.phase,
                operation,
            }
            .into());
        }
        Ok(())
    }

    // ========== TIME-DRIVEN ADVANCEMENT ==========

    /// Advance every campaign whose clock has run out. Invoked by the
    /// trigger collaborator; per-campaign errors are logged and skipped so
    /// one bad campaign never stalls the rest.
    pub async fn advance_due(&self, now: DateTime<Utc>) -> AppResult<PhaseAdvanceReport> {
        let mut report = PhaseAdvanceReport::default();

        for campaign in self.campaigns.find_in_phase(CampaignPhase::Active).await? {
            if now < campaign.grace_opens_at(self.grace_window) {
                continue;
            }
            match self
                .campaigns
                .compare_and_set_phase(campaign.id, CampaignPhase::Active, CampaignPhase::GracePeriod)
                .await
            {
                Ok(true) => {
                    info!(campaign_id = %campaign.id, "campaign entered grace period");
                    report.entered_grace += 1;
                }
                Ok(false) => {}
                Err(e) => error!(campaign_id = %campaign.id, "grace transition failed: {e}"),
            }
        }

        for campaign in self
            .campaigns
            .find_in_phase(CampaignPhase::GracePeriod)
            .await?
        {
            if now < campaign.ends_at {
                continue;
            }
            match self.lock(campaign.id).await {
                Ok(true) => report.locked += 1,
                Ok(false) => {}
                Err(e) => error!(campaign_id = %campaign.id, "lock failed: {e}"),
            }
        }

        Ok(report)
    }

    /// Entry to LOCKED. The compare-and-set decides a single winner: only
    /// that caller sweeps uncommitted pledges and generates settlement;
    /// everyone else observes "already locked" and does nothing.
    pub async fn lock(&self, campaign_id: Uuid) -> AppResult<bool> {
        let campaign = self.load(campaign_id).await?;
        if campaign.phase == CampaignPhase::Locked {
            info!(campaign_id = %campaign_id, "campaign already locked");
            return Ok(false);
        }
        CampaignPhase::ensure_transition(campaign.phase, CampaignPhase::Locked)?;

        let won = self
            .campaigns
            .compare_and_set_phase(campaign.id, campaign.phase, CampaignPhase::Locked)
            .await?;
        if !won {
            info!(campaign_id = %campaign_id, "campaign already locked");
            return Ok(false);
        }

        let swept = self.pledges.withdraw_pending(campaign_id).await?;
        self.settlement.generate(&campaign).await?;
        info!(campaign_id = %campaign_id, swept, "campaign locked and settled");

        emit(
            self.notifier.as_ref(),
            NotificationEvent::CampaignLocked { campaign_id },
        )
        .await;
        Ok(true)
    }

    /// Internal, phase-triggered entry point for settlement. Valid only
    /// once the campaign is LOCKED; re-running against an already-settled
    /// campaign trips the one-intent-per-pledge constraint.
    pub async fn generate_settlement(&self, campaign_id: Uuid) -> AppResult<usize> {
        let campaign = self.load(campaign_id).await?;
        if campaign.phase != CampaignPhase::Locked {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "generate_settlement",
            }
            .into());
        }
        let intents = self.settlement.generate(&campaign).await?;
        Ok(intents.len())
    }

    // ========== PROGRESS ==========

    /// Live tier progress from the non-withdrawn (committed + pending)
    /// quantity
    pub async fn bracket_progress(&self, campaign_id: Uuid) -> AppResult<BracketResolution> {
        let campaign = self.load(campaign_id).await?;
        let quantity = self
            .pledges
            .quantity_in_statuses(
                campaign_id,
                &[
                    crate::pledge::models::PledgeStatus::Pending,
                    crate::pledge::models::PledgeStatus::Committed,
                ],
            )
            .await?;
        Ok(pricing::resolve(&campaign.brackets, quantity)?)
    }
}
