#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use uuid::Uuid;

use groupbuy_backend::campaign::models::{Campaign, DiscountBracket};
use groupbuy_backend::campaign::repository::CampaignRepository;
use groupbuy_backend::campaign::service::{CampaignDraft, CampaignService};
use groupbuy_backend::error::{AppError, AppResult};
use groupbuy_backend::gateway::PaymentGateway;
use groupbuy_backend::notify::TracingNotifier;
use groupbuy_backend::org::Organization;
use groupbuy_backend::org::OrganizationRepository;
use groupbuy_backend::payment::models::PaymentIntent;
use groupbuy_backend::payment::reconcile::RetryReconciliationJob;
use groupbuy_backend::payment::service::PaymentService;
use groupbuy_backend::pledge::service::PledgeService;
use groupbuy_backend::settlement::SettlementGenerator;
use groupbuy_backend::storage::memory::{
    InMemoryCampaigns, InMemoryOrganizations, InMemoryPaymentIntents, InMemoryPledges,
};

/// Gateway stub: records checkout requests and fails on demand so tests
/// can simulate a transient outage per intent.
#[derive(Default)]
pub struct RecordingGateway {
    pub checkouts: Mutex<Vec<Uuid>>,
    pub fail_for: Mutex<HashSet<Uuid>>,
}

impl RecordingGateway {
    pub async fn fail_intent(&self, intent_id: Uuid) {
        self.fail_for.lock().await.insert(intent_id);
    }

    pub async fn checkout_count(&self) -> usize {
        self.checkouts.lock().await.len()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout(&self, intent: &PaymentIntent) -> AppResult<()> {
        if self.fail_for.lock().await.contains(&intent.id) {
            return Err(AppError::External("gateway unreachable".to_string()));
        }
        self.checkouts.lock().await.push(intent.id);
        Ok(())
    }
}

pub const GRACE_HOURS: i64 = 48;

/// Everything wired over the in-memory store
pub struct TestEngine {
    pub campaign_repo: Arc<InMemoryCampaigns>,
    pub pledge_repo: Arc<InMemoryPledges>,
    pub intent_repo: Arc<InMemoryPaymentIntents>,
    pub org_repo: Arc<InMemoryOrganizations>,
    pub gateway: Arc<RecordingGateway>,
    pub campaigns: Arc<CampaignService>,
    pub pledges: Arc<PledgeService>,
    pub payments: Arc<PaymentService>,
    pub reconciliation: Arc<RetryReconciliationJob>,
}

impl TestEngine {
    pub fn new() -> Self {
        let campaign_repo = Arc::new(InMemoryCampaigns::new());
        let pledge_repo = Arc::new(InMemoryPledges::new());
        let intent_repo = Arc::new(InMemoryPaymentIntents::new());
        let org_repo = Arc::new(InMemoryOrganizations::new());
        let gateway = Arc::new(RecordingGateway::default());
        let notifier = Arc::new(TracingNotifier);

        let settlement = Arc::new(SettlementGenerator::new(
            pledge_repo.clone(),
            intent_repo.clone(),
        ));
        let campaigns = Arc::new(CampaignService::new(
            campaign_repo.clone(),
            pledge_repo.clone(),
            org_repo.clone(),
            settlement,
            notifier.clone(),
            Duration::hours(GRACE_HOURS),
        ));
        let pledges = Arc::new(PledgeService::new(
            pledge_repo.clone(),
            campaign_repo.clone(),
            org_repo.clone(),
            notifier.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            intent_repo.clone(),
            gateway.clone(),
            notifier,
        ));
        let reconciliation = Arc::new(RetryReconciliationJob::new(
            intent_repo.clone(),
            payments.clone(),
        ));

        Self {
            campaign_repo,
            pledge_repo,
            intent_repo,
            org_repo,
            gateway,
            campaigns,
            pledges,
            payments,
            reconciliation,
        }
    }

    pub async fn org(&self, name: &str) -> Organization {
        let org = Organization::new(name);
        self.org_repo.insert(&org).await.unwrap();
        org
    }

    pub async fn inactive_org(&self, name: &str) -> Organization {
        let mut org = Organization::new(name);
        org.active = false;
        self.org_repo.insert(&org).await.unwrap();
        org
    }

    /// Draft with the standard 10/9/8 bracket ladder, ending in 72 hours
    pub async fn draft_campaign(&self, supplier: &Organization) -> Campaign {
        self.campaigns
            .create_draft(CampaignDraft {
                supplier_org_id: supplier.id,
                title: "Bulk widget order".to_string(),
                description: "Widgets at volume pricing".to_string(),
                starts_at: Utc::now(),
                ends_at: Utc::now() + Duration::hours(72),
                target_quantity: 250,
                brackets: standard_brackets(),
            })
            .await
            .unwrap()
    }

    pub async fn active_campaign(&self, supplier: &Organization) -> Campaign {
        let draft = self.draft_campaign(supplier).await;
        self.campaigns
            .publish(draft.id, supplier.id, Utc::now())
            .await
            .unwrap()
    }

    /// Active campaign advanced into its grace period
    pub async fn grace_campaign(&self, supplier: &Organization) -> Campaign {
        let campaign = self.active_campaign(supplier).await;
        self.campaigns
            .advance_due(campaign.ends_at - Duration::hours(1))
            .await
            .unwrap();
        self.campaign_repo.find(campaign.id).await.unwrap().unwrap()
    }

    /// Drive the campaign past its end date, sweeping and settling
    pub async fn lock_campaign(&self, campaign: &Campaign) {
        self.campaigns
            .advance_due(campaign.ends_at + Duration::seconds(1))
            .await
            .unwrap();
    }
}

pub fn bracket(
    position: i32,
    min: i64,
    max: Option<i64>,
    price: rust_decimal::Decimal,
) -> DiscountBracket {
    DiscountBracket {
        position,
        min_quantity: min,
        max_quantity: max,
        unit_price: price,
    }
}

/// 0-99 @ $10, 100-249 @ $9, 250+ @ $8
pub fn standard_brackets() -> Vec<DiscountBracket> {
    vec![
        bracket(0, 0, Some(99), dec!(10)),
        bracket(1, 100, Some(249), dec!(9)),
        bracket(2, 250, None, dec!(8)),
    ]
}
