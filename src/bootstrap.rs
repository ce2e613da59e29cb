use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    campaign::service::CampaignService,
    config::Config,
    error::AppResult,
    gateway::LoggingGateway,
    notify::TracingNotifier,
    payment::{reconcile::RetryReconciliationJob, service::PaymentService},
    pledge::service::PledgeService,
    settlement::SettlementGenerator,
    storage::postgres::{PgCampaigns, PgOrganizations, PgPaymentIntents, PgPledges},
};

/// Fully wired service graph
pub struct AppState {
    pub campaigns: Arc<CampaignService>,
    pub pledges: Arc<PledgeService>,
    pub payments: Arc<PaymentService>,
    pub reconciliation: Arc<RetryReconciliationJob>,
}

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing engine components ...");

    let pool = initialize_database(&config.database_url).await?;

    // Repositories
    let organizations = Arc::new(PgOrganizations::new(pool.clone()));
    let campaign_repo = Arc::new(PgCampaigns::new(pool.clone()));
    let pledge_repo = Arc::new(PgPledges::new(pool.clone()));
    let intent_repo = Arc::new(PgPaymentIntents::new(pool.clone()));

    // External collaborators
    let notifier = Arc::new(TracingNotifier);
    let gateway = Arc::new(LoggingGateway);

    // Core services
    let settlement = Arc::new(SettlementGenerator::new(
        pledge_repo.clone(),
        intent_repo.clone(),
    ));
    let campaigns = Arc::new(CampaignService::new(
        campaign_repo.clone(),
        pledge_repo.clone(),
        organizations.clone(),
        settlement,
        notifier.clone(),
        config.grace_window(),
    ));
    let pledges = Arc::new(PledgeService::new(
        pledge_repo,
        campaign_repo,
        organizations,
        notifier.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        intent_repo.clone(),
        gateway,
        notifier,
    ));
    let reconciliation = Arc::new(RetryReconciliationJob::new(intent_repo, payments.clone()));

    info!("Engine components initialized");

    Ok(AppState {
        campaigns,
        pledges,
        payments,
        reconciliation,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Database initialized");
    Ok(pool)
}
