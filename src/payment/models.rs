use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::error::{AppError, PaymentError};

/// Automated collection attempts are capped; the fourth failure can only
/// be escalated to manual AR collection.
pub const MAX_RETRIES: i32 = 3;

/// Payment intent status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_intent_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Pending,
    Processing,
    Succeeded,
    FailedRetry1,
    FailedRetry2,
    FailedRetry3,
    SentToAr,
    CollectedViaAr,
    WrittenOff,
}

impl sqlx::postgres::PgHasArrayType for PaymentIntentStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_payment_intent_status")
    }
}

impl PaymentIntentStatus {
    /// Statically-defined adjacency table. This is the single gate
    /// guarding intent mutations: every caller - gateway callbacks, the
    /// retry path, AR disposition - validates against it before the
    /// store's compare-and-set runs.
    pub fn allowed_transitions(self) -> &'static [PaymentIntentStatus] {
        use PaymentIntentStatus::*;
        match self {
            Pending => &[Processing],
            Processing => &[Succeeded, FailedRetry1, FailedRetry2, FailedRetry3],
            FailedRetry1 => &[Processing],
            FailedRetry2 => &[Processing],
            FailedRetry3 => &[SentToAr],
            SentToAr => &[CollectedViaAr, WrittenOff],
            // Terminal states
            Succeeded | CollectedViaAr | WrittenOff => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Statuses the reconciliation job may drive back to PROCESSING
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::FailedRetry1 | PaymentIntentStatus::FailedRetry2
        )
    }

    /// FAILED_RETRY_n for the n-th failed attempt (1..=3)
    pub fn failed_for_attempt(attempt: i32) -> Option<PaymentIntentStatus> {
        match attempt {
            1 => Some(PaymentIntentStatus::FailedRetry1),
            2 => Some(PaymentIntentStatus::FailedRetry2),
            3 => Some(PaymentIntentStatus::FailedRetry3),
            _ => None,
        }
    }

    pub fn ensure_transition(
        from: PaymentIntentStatus,
        to: PaymentIntentStatus,
    ) -> Result<(), PaymentError> {
        if from.allowed_transitions().contains(&to) {
            Ok(())
        } else {
            Err(PaymentError::InvalidTransition { from, to })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentIntentStatus::Pending => "pending",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::FailedRetry1 => "failed_retry1",
            PaymentIntentStatus::FailedRetry2 => "failed_retry2",
            PaymentIntentStatus::FailedRetry3 => "failed_retry3",
            PaymentIntentStatus::SentToAr => "sent_to_ar",
            PaymentIntentStatus::CollectedViaAr => "collected_via_ar",
            PaymentIntentStatus::WrittenOff => "written_off",
        }
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Total parse - an unknown value is an explicit error the caller must
/// handle, never a silent default.
impl std::str::FromStr for PaymentIntentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentIntentStatus::Pending),
            "processing" => Ok(PaymentIntentStatus::Processing),
            "succeeded" => Ok(PaymentIntentStatus::Succeeded),
            "failed_retry1" => Ok(PaymentIntentStatus::FailedRetry1),
            "failed_retry2" => Ok(PaymentIntentStatus::FailedRetry2),
            "failed_retry3" => Ok(PaymentIntentStatus::FailedRetry3),
            "sent_to_ar" => Ok(PaymentIntentStatus::SentToAr),
            "collected_via_ar" => Ok(PaymentIntentStatus::CollectedViaAr),
            "written_off" => Ok(PaymentIntentStatus::WrittenOff),
            other => Err(AppError::InvalidInput(format!(
                "Unknown payment intent status: {other}"
            ))),
        }
    }
}

/// The obligation to collect payment for one committed pledge at the
/// campaign's clearing price. Created once at settlement, never
/// re-created, retired into SUCCEEDED, COLLECTED_VIA_AR or WRITTEN_OFF.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub campaign_id: Uuid,
    /// One-to-one with its pledge, enforced by the store
    pub pledge_id: Uuid,
    pub buyer_org_id: Uuid,
    /// Computed at settlement; never re-derived afterwards
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: PaymentIntentStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn new(campaign_id: Uuid, pledge_id: Uuid, buyer_org_id: Uuid, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            pledge_id,
            buyer_org_id,
            amount,
            status: PaymentIntentStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
