// Periodic trigger - drives phase advancement and retry reconciliation.
// The cadences are operational policy, supplied through configuration.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::campaign::service::CampaignService;
use crate::payment::reconcile::RetryReconciliationJob;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub phase_tick: Duration,
    pub reconcile_tick: Duration,
}

/// Runs the two recurring jobs on independent interval loops. A failed
/// cycle is logged and the loop carries on; the loops only stop with the
/// process.
pub struct JobScheduler {
    config: SchedulerConfig,
    campaigns: Arc<CampaignService>,
    reconciliation: Arc<RetryReconciliationJob>,
}

impl JobScheduler {
    pub fn new(
        config: SchedulerConfig,
        campaigns: Arc<CampaignService>,
        reconciliation: Arc<RetryReconciliationJob>,
    ) -> Self {
        Self {
            config,
            campaigns,
            reconciliation,
        }
    }

    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let campaigns = self.campaigns.clone();
        let phase_tick = self.config.phase_tick;
        let phase_loop = tokio::spawn(async move {
            let mut interval = interval(phase_tick);
            loop {
                interval.tick().await;
                match campaigns.advance_due(Utc::now()).await {
                    Ok(report) if report.entered_grace + report.locked > 0 => {
                        info!(
                            entered_grace = report.entered_grace,
                            locked = report.locked,
                            "phase advancement cycle completed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("phase advancement cycle failed: {e}"),
                }
            }
        });

        let reconciliation = self.reconciliation.clone();
        let reconcile_tick = self.config.reconcile_tick;
        let reconcile_loop = tokio::spawn(async move {
            let mut interval = interval(reconcile_tick);
            loop {
                interval.tick().await;
                if let Err(e) = reconciliation.run().await {
                    error!("retry reconciliation cycle failed: {e}");
                }
            }
        });

        vec![phase_loop, reconcile_loop]
    }
}
