use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::error::{AppError, CampaignError};

/// Campaign lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "campaign_phase", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignPhase {
    Draft,
    Active,
    GracePeriod,
    Locked,
    Cancelled,
    Done,
}

impl CampaignPhase {
    /// Statically-defined adjacency table for the campaign state machine.
    /// Every phase mutation goes through `ensure_transition` before the
    /// store is touched; the store re-checks with a compare-and-set.
    pub fn allowed_transitions(self) -> &'static [CampaignPhase] {
        use CampaignPhase::*;
        match self {
            Draft => &[Active, Cancelled],
            Active => &[GracePeriod, Cancelled],
            GracePeriod => &[Locked, Cancelled],
            Locked => &[Done],
            // Terminal phases
            Cancelled | Done => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn ensure_transition(from: CampaignPhase, to: CampaignPhase) -> Result<(), CampaignError> {
        if from.allowed_transitions().contains(&to) {
            Ok(())
        } else {
            Err(CampaignError::InvalidTransition { from, to })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CampaignPhase::Draft => "draft",
            CampaignPhase::Active => "active",
            CampaignPhase::GracePeriod => "grace_period",
            CampaignPhase::Locked => "locked",
            CampaignPhase::Cancelled => "cancelled",
            CampaignPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for CampaignPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CampaignPhase {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignPhase::Draft),
            "active" => Ok(CampaignPhase::Active),
            "grace_period" => Ok(CampaignPhase::GracePeriod),
            "locked" => Ok(CampaignPhase::Locked),
            "cancelled" => Ok(CampaignPhase::Cancelled),
            "done" => Ok(CampaignPhase::Done),
            other => Err(AppError::InvalidInput(format!(
                "Unknown campaign phase: {other}"
            ))),
        }
    }
}

/// One tier of a campaign's quantity-based pricing.
///
/// Brackets partition the quantity space: ordered by `position`, each
/// minimum equals the previous maximum + 1 (0 for the first) and the final
/// bracket has no upper bound. Immutable once the campaign leaves DRAFT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DiscountBracket {
    pub position: i32,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

impl DiscountBracket {
    pub fn contains(&self, quantity: i64) -> bool {
        quantity >= self.min_quantity && self.max_quantity.map_or(true, |max| quantity <= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_quantity.is_none()
    }
}

/// Campaign entity - a time-boxed group-buy offer with tiered pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub supplier_org_id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub target_quantity: i64,
    pub phase: CampaignPhase,
    /// Sorted by `position`
    pub brackets: Vec<DiscountBracket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        supplier_org_id: Uuid,
        title: String,
        description: String,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        target_quantity: i64,
        brackets: Vec<DiscountBracket>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            supplier_org_id,
            title,
            description,
            starts_at,
            ends_at,
            target_quantity,
            phase: CampaignPhase::Draft,
            brackets,
            created_at: now,
            updated_at: now,
        }
    }

    /// Instant at which the grace period opens
    pub fn grace_opens_at(&self, grace_window: chrono::Duration) -> DateTime<Utc> {
        self.ends_at - grace_window
    }

    pub fn is_draft(&self) -> bool {
        self.phase == CampaignPhase::Draft
    }
}
