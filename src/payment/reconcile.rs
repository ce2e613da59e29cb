use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::models::MAX_RETRIES;
use super::repository::PaymentIntentRepository;
use super::service::PaymentService;
use crate::error::AppResult;

/// Aggregate outcome of one reconciliation run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReconciliationReport {
    pub scanned: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Periodically invoked sweep over retryable intents.
///
/// Each item is independent: a transient gateway outage on one intent is
/// logged and counted, never aborting the rest of the batch. Only a
/// storage fault while scanning is fatal for the run.
pub struct RetryReconciliationJob {
    intents: Arc<dyn PaymentIntentRepository>,
    payments: Arc<PaymentService>,
}

impl RetryReconciliationJob {
    pub fn new(
        intents: Arc<dyn PaymentIntentRepository>,
        payments: Arc<PaymentService>,
    ) -> Self {
        Self { intents, payments }
    }

    pub async fn run(&self) -> AppResult<ReconciliationReport> {
        let candidates = self.intents.find_retryable(MAX_RETRIES).await?;

        let mut report = ReconciliationReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for intent in candidates {
            match self.payments.retry(intent.id).await {
                Ok(_) => report.retried += 1,
                Err(e) => {
                    warn!(intent_id = %intent.id, "retry failed: {e}");
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                retried = report.retried,
                failed = report.failed,
                "retry reconciliation completed"
            );
        }
        Ok(report)
    }
}
