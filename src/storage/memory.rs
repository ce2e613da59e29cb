//! In-memory store - single-process adapter used by the test suite and
//! local development. Each repository guards its rows and composite-key
//! indexes behind one RwLock so uniqueness checks and compare-and-set
//! writes are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::campaign::models::{Campaign, CampaignPhase};
use crate::campaign::repository::CampaignRepository;
use crate::error::{AppError, AppResult, PaymentError, PledgeError};
use crate::org::{Organization, OrganizationRepository};
use crate::payment::models::{PaymentIntent, PaymentIntentStatus};
use crate::payment::repository::PaymentIntentRepository;
use crate::pledge::models::{Pledge, PledgeStatus};
use crate::pledge::repository::PledgeRepository;

// ========== ORGANIZATIONS ==========

#[derive(Default)]
pub struct InMemoryOrganizations {
    orgs: RwLock<HashMap<Uuid, Organization>>,
}

impl InMemoryOrganizations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizations {
    async fn insert(&self, org: &Organization) -> AppResult<()> {
        self.orgs.write().await.insert(org.id, org.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Organization>> {
        Ok(self.orgs.read().await.get(&id).cloned())
    }
}

// ========== CAMPAIGNS ==========

#[derive(Default)]
pub struct InMemoryCampaigns {
    campaigns: RwLock<HashMap<Uuid, Campaign>>,
}

impl InMemoryCampaigns {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignRepository for InMemoryCampaigns {
    async fn insert(&self, campaign: &Campaign) -> AppResult<()> {
        self.campaigns
            .write()
            .await
            .insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Campaign>> {
        Ok(self.campaigns.read().await.get(&id).cloned())
    }

    async fn update_draft(&self, campaign: &Campaign) -> AppResult<()> {
        let mut campaigns = self.campaigns.write().await;
        let stored = campaigns
            .get_mut(&campaign.id)
            .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", campaign.id)))?;
        if stored.phase != CampaignPhase::Draft {
            return Err(AppError::NotFound(format!(
                "Draft campaign {} not found",
                campaign.id
            )));
        }
        *stored = campaign.clone();
        Ok(())
    }

    async fn delete_draft(&self, id: Uuid) -> AppResult<()> {
        let mut campaigns = self.campaigns.write().await;
        match campaigns.get(&id) {
            Some(stored) if stored.phase == CampaignPhase::Draft => {
                campaigns.remove(&id);
                Ok(())
            }
            _ => Err(AppError::NotFound(format!("Draft campaign {id} not found"))),
        }
    }

    async fn compare_and_set_phase(
        &self,
        id: Uuid,
        from: CampaignPhase,
        to: CampaignPhase,
    ) -> AppResult<bool> {
        let mut campaigns = self.campaigns.write().await;
        let stored = campaigns
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Campaign {id} not found")))?;
        if stored.phase != from {
            return Ok(false);
        }
        stored.phase = to;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_in_phase(&self, phase: CampaignPhase) -> AppResult<Vec<Campaign>> {
        Ok(self
            .campaigns
            .read()
            .await
            .values()
            .filter(|c| c.phase == phase)
            .cloned()
            .collect())
    }
}

// ========== PLEDGES ==========

#[derive(Default)]
struct PledgeRows {
    rows: HashMap<Uuid, Pledge>,
    /// (campaign, buyer) -> pledge id; the uniqueness arbiter
    by_pair: HashMap<(Uuid, Uuid), Uuid>,
}

#[derive(Default)]
pub struct InMemoryPledges {
    inner: RwLock<PledgeRows>,
}

impl InMemoryPledges {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PledgeRepository for InMemoryPledges {
    async fn insert(&self, pledge: &Pledge) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let pair = (pledge.campaign_id, pledge.buyer_org_id);
        if inner.by_pair.contains_key(&pair) {
            return Err(PledgeError::DuplicateCommitment.into());
        }
        inner.by_pair.insert(pair, pledge.id);
        inner.rows.insert(pledge.id, pledge.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Pledge>> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn find_for_buyer(
        &self,
        campaign_id: Uuid,
        buyer_org_id: Uuid,
    ) -> AppResult<Option<Pledge>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_pair
            .get(&(campaign_id, buyer_org_id))
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn update(&self, pledge: &Pledge) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .rows
            .get_mut(&pledge.id)
            .ok_or_else(|| AppError::NotFound(format!("Pledge {} not found", pledge.id)))?;
        *stored = pledge.clone();
        Ok(())
    }

    async fn find_by_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<Pledge>> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|p| p.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn find_by_campaign_in_status(
        &self,
        campaign_id: Uuid,
        status: PledgeStatus,
    ) -> AppResult<Vec<Pledge>> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|p| p.campaign_id == campaign_id && p.status == status)
            .cloned()
            .collect())
    }

    async fn withdraw_pending(&self, campaign_id: Uuid) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let mut swept = 0;
        for pledge in inner.rows.values_mut() {
            if pledge.campaign_id == campaign_id && pledge.status == PledgeStatus::Pending {
                pledge.status = PledgeStatus::Withdrawn;
                pledge.updated_at = Utc::now();
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn quantity_in_statuses(
        &self,
        campaign_id: Uuid,
        statuses: &[PledgeStatus],
    ) -> AppResult<i64> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|p| p.campaign_id == campaign_id && statuses.contains(&p.status))
            .map(|p| p.quantity)
            .sum())
    }
}

// ========== PAYMENT INTENTS ==========

#[derive(Default)]
struct IntentRows {
    rows: HashMap<Uuid, PaymentIntent>,
    /// pledge -> intent id; one intent per pledge, ever
    by_pledge: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct InMemoryPaymentIntents {
    inner: RwLock<IntentRows>,
}

impl InMemoryPaymentIntents {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentIntentRepository for InMemoryPaymentIntents {
    async fn insert(&self, intent: &PaymentIntent) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.by_pledge.contains_key(&intent.pledge_id) {
            return Err(PaymentError::DuplicateIntent(intent.pledge_id).into());
        }
        inner.by_pledge.insert(intent.pledge_id, intent.id);
        inner.rows.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn find_by_pledge(&self, pledge_id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_pledge
            .get(&pledge_id)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expect: PaymentIntentStatus,
        next: PaymentIntentStatus,
        retry_count: i32,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Payment intent {id} not found")))?;
        if stored.status != expect {
            return Ok(false);
        }
        stored.status = next;
        stored.retry_count = retry_count;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_retryable(&self, max_retries: i32) -> AppResult<Vec<PaymentIntent>> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|i| i.status.is_retryable() && i.retry_count < max_retries)
            .cloned()
            .collect())
    }

    async fn find_by_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<PaymentIntent>> {
        let mut intents: Vec<PaymentIntent> = self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|i| i.campaign_id == campaign_id)
            .cloned()
            .collect();
        intents.sort_by_key(|i| i.created_at);
        Ok(intents)
    }

    async fn find_by_buyer(&self, buyer_org_id: Uuid) -> AppResult<Vec<PaymentIntent>> {
        let mut intents: Vec<PaymentIntent> = self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|i| i.buyer_org_id == buyer_org_id)
            .cloned()
            .collect();
        intents.sort_by_key(|i| i.created_at);
        Ok(intents)
    }
}
