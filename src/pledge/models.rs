use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Pledge status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "pledge_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PledgeStatus {
    Pending,
    Committed,
    Withdrawn,
}

impl sqlx::postgres::PgHasArrayType for PledgeStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_pledge_status")
    }
}

/// A buyer organization's stated intent to purchase a quantity under a
/// campaign.
///
/// INVARIANT: at most one row exists per (campaign, buyer) pair. A
/// withdrawn pledge is reactivated in place, so the composite key is
/// reused, never re-created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pledge {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub buyer_org_id: Uuid,
    pub quantity: i64,
    pub status: PledgeStatus,
    /// Set only on commit, cleared on reactivation
    pub committed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pledge {
    pub fn new(campaign_id: Uuid, buyer_org_id: Uuid, quantity: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            buyer_org_id,
            quantity,
            status: PledgeStatus::Pending,
            committed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bring a withdrawn pledge back into play with a fresh quantity
    pub fn reactivate(&mut self, quantity: i64) {
        self.quantity = quantity;
        self.status = PledgeStatus::Pending;
        self.committed_at = None;
        self.updated_at = Utc::now();
    }

    pub fn commit(&mut self, at: DateTime<Utc>) {
        self.status = PledgeStatus::Committed;
        self.committed_at = Some(at);
        self.updated_at = at;
    }

    pub fn withdraw(&mut self) {
        self.status = PledgeStatus::Withdrawn;
        self.updated_at = Utc::now();
    }

    pub fn is_withdrawn(&self) -> bool {
        self.status == PledgeStatus::Withdrawn
    }
}
