use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::models::{Pledge, PledgeStatus};
use super::repository::PledgeRepository;
use crate::campaign::models::{Campaign, CampaignPhase};
use crate::campaign::repository::CampaignRepository;
use crate::error::{AppError, AppResult, CampaignError, PledgeError};
use crate::notify::{emit, NotificationEvent, Notifier};
use crate::org::OrganizationRepository;

/// Owns buyer commitment records under the phase-dependent mutation rules
pub struct PledgeService {
    pledges: Arc<dyn PledgeRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    notifier: Arc<dyn Notifier>,
}

impl PledgeService {
    pub fn new(
        pledges: Arc<dyn PledgeRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pledges,
            campaigns,
            organizations,
            notifier,
        }
    }

    async fn load_campaign(&self, campaign_id: Uuid) -> AppResult<Campaign> {
        self.campaigns
            .find(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {campaign_id} not found")))
    }

    async fn load_pledge(&self, pledge_id: Uuid) -> AppResult<Pledge> {
        self.pledges
            .find(pledge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pledge {pledge_id} not found")))
    }

    /// Register a buyer's interest in a campaign.
    ///
    /// A WITHDRAWN pledge for the pair is reactivated in place - the one
    /// exception to duplicate-create failure. A PENDING or COMMITTED
    /// pledge for the pair is a duplicate commitment.
    pub async fn create(
        &self,
        campaign_id: Uuid,
        buyer_org_id: Uuid,
        quantity: i64,
    ) -> AppResult<Pledge> {
        if quantity <= 0 {
            return Err(AppError::InvalidInput(
                "Pledge quantity must be positive".to_string(),
            ));
        }

        let org = self
            .organizations
            .find(buyer_org_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Organization {buyer_org_id} not found")))?;
        if !org.active {
            return Err(PledgeError::OrganizationNotActive(buyer_org_id).into());
        }

        let campaign = self.load_campaign(campaign_id).await?;
        if !matches!(
            campaign.phase,
            CampaignPhase::Active | CampaignPhase::GracePeriod
        ) {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "create_pledge",
            }
            .into());
        }

        match self.pledges.find_for_buyer(campaign_id, buyer_org_id).await? {
            Some(mut existing) if existing.is_withdrawn() => {
                existing.reactivate(quantity);
                self.pledges.update(&existing).await?;
                info!(pledge_id = %existing.id, quantity, "pledge reactivated");
                Ok(existing)
            }
            Some(_) => Err(PledgeError::DuplicateCommitment.into()),
            None => {
                let pledge = Pledge::new(campaign_id, buyer_org_id, quantity);
                // The store's (campaign, buyer) uniqueness constraint is
                // the arbiter for concurrent creates
                self.pledges.insert(&pledge).await?;
                info!(pledge_id = %pledge.id, campaign_id = %campaign_id, quantity, "pledge created");
                Ok(pledge)
            }
        }
    }

    /// Adjust quantity - only while the campaign is ACTIVE, only by the
    /// owning buyer
    pub async fn update(
        &self,
        pledge_id: Uuid,
        buyer_org_id: Uuid,
        quantity: i64,
    ) -> AppResult<Pledge> {
        if quantity <= 0 {
            return Err(AppError::InvalidInput(
                "Pledge quantity must be positive".to_string(),
            ));
        }

        let mut pledge = self.load_pledge(pledge_id).await?;
        if pledge.buyer_org_id != buyer_org_id {
            return Err(PledgeError::AccessDenied(buyer_org_id).into());
        }

        let campaign = self.load_campaign(pledge.campaign_id).await?;
        if campaign.phase != CampaignPhase::Active {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "update_pledge",
            }
            .into());
        }
        if pledge.status != PledgeStatus::Pending {
            return Err(PledgeError::InvalidStatus {
                status: pledge.status,
                expected: PledgeStatus::Pending,
            }
            .into());
        }

        pledge.quantity = quantity;
        pledge.updated_at = Utc::now();
        self.pledges.update(&pledge).await?;
        Ok(pledge)
    }

    /// Withdraw a pledge. Idempotent: cancelling an already-WITHDRAWN
    /// pledge is a no-op.
    pub async fn cancel(&self, pledge_id: Uuid, buyer_org_id: Uuid) -> AppResult<Pledge> {
        let mut pledge = self.load_pledge(pledge_id).await?;
        if pledge.is_withdrawn() {
            return Ok(pledge);
        }
        if pledge.buyer_org_id != buyer_org_id {
            return Err(PledgeError::AccessDenied(buyer_org_id).into());
        }

        let campaign = self.load_campaign(pledge.campaign_id).await?;
        if campaign.phase != CampaignPhase::Active {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "cancel_pledge",
            }
            .into());
        }

        pledge.withdraw();
        self.pledges.update(&pledge).await?;
        info!(pledge_id = %pledge_id, "pledge withdrawn");
        Ok(pledge)
    }

    /// Confirm a pending pledge during the grace period, stamping the
    /// commit time. Committing twice, or outside grace period, fails.
    pub async fn commit(&self, pledge_id: Uuid, buyer_org_id: Uuid) -> AppResult<Pledge> {
        let mut pledge = self.load_pledge(pledge_id).await?;
        if pledge.buyer_org_id != buyer_org_id {
            return Err(PledgeError::AccessDenied(buyer_org_id).into());
        }

        let campaign = self.load_campaign(pledge.campaign_id).await?;
        if campaign.phase != CampaignPhase::GracePeriod {
            return Err(CampaignError::PhaseViolation {
                phase: campaign.phase,
                operation: "commit_pledge",
            }
            .into());
        }
        if pledge.status != PledgeStatus::Pending {
            return Err(PledgeError::InvalidStatus {
                status: pledge.status,
                expected: PledgeStatus::Pending,
            }
            .into());
        }

        pledge.commit(Utc::now());
        self.pledges.update(&pledge).await?;
        info!(pledge_id = %pledge_id, "pledge committed");
        emit(
            self.notifier.as_ref(),
            NotificationEvent::PledgeCommitted {
                campaign_id: pledge.campaign_id,
                pledge_id: pledge.id,
                buyer_org_id,
            },
        )
        .await;
        Ok(pledge)
    }

    /// End-of-grace-period sweep: silence means the buyer opts out of the
    /// final price.
    pub async fn sweep_uncommitted(&self, campaign_id: Uuid) -> AppResult<u64> {
        let swept = self.pledges.withdraw_pending(campaign_id).await?;
        if swept > 0 {
            info!(campaign_id = %campaign_id, swept, "uncommitted pledges withdrawn");
        }
        Ok(swept)
    }

    /// Total quantity counting toward settlement
    pub async fn committed_quantity(&self, campaign_id: Uuid) -> AppResult<i64> {
        self.pledges
            .quantity_in_statuses(campaign_id, &[PledgeStatus::Committed])
            .await
    }

    /// Committed + pending quantity, used for live progress before lock
    pub async fn active_quantity(&self, campaign_id: Uuid) -> AppResult<i64> {
        self.pledges
            .quantity_in_statuses(
                campaign_id,
                &[PledgeStatus::Pending, PledgeStatus::Committed],
            )
            .await
    }
}
