use std::sync::Arc;

use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groupbuy_backend::{
    bootstrap,
    config::Config,
    scheduler::{JobScheduler, SchedulerConfig},
};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,groupbuy_backend=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting group-buy settlement worker");

    dotenv::dotenv().ok();
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config error: {e}"))?;

    let state = bootstrap::initialize_app_state(&config).await?;

    let scheduler = JobScheduler::new(
        SchedulerConfig {
            phase_tick: Duration::from_secs(config.phase_tick_secs),
            reconcile_tick: Duration::from_secs(config.reconcile_tick_secs),
        },
        Arc::clone(&state.campaigns),
        Arc::clone(&state.reconciliation),
    );
    let handles = scheduler.start();
    info!(
        phase_tick_secs = config.phase_tick_secs,
        reconcile_tick_secs = config.reconcile_tick_secs,
        "scheduler started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
