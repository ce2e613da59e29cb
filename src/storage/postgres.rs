//! Postgres store - the production adapter. State transitions are
//! compare-and-set updates (`UPDATE ... WHERE <expected>`) checked through
//! `rows_affected`, and the uniqueness invariants live on the schema's
//! unique constraints, not in application checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::prelude::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::campaign::models::{Campaign, CampaignPhase, DiscountBracket};
use crate::campaign::repository::CampaignRepository;
use crate::error::{AppError, AppResult, PaymentError, PledgeError};
use crate::org::{Organization, OrganizationRepository};
use crate::payment::models::{PaymentIntent, PaymentIntentStatus};
use crate::payment::repository::PaymentIntentRepository;
use crate::pledge::models::{Pledge, PledgeStatus};
use crate::pledge::repository::PledgeRepository;

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

// ========== ORGANIZATIONS ==========

pub struct PgOrganizations {
    pool: PgPool,
}

impl PgOrganizations {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizations {
    async fn insert(&self, org: &Organization) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, active, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(org.active)
        .bind(org.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, active, created_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }
}

// ========== CAMPAIGNS ==========

#[derive(FromRow)]
struct CampaignRow {
    id: Uuid,
    supplier_org_id: Uuid,
    title: String,
    description: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    target_quantity: i64,
    phase: CampaignPhase,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CampaignRow {
    fn into_campaign(self, brackets: Vec<DiscountBracket>) -> Campaign {
        Campaign {
            id: self.id,
            supplier_org_id: self.supplier_org_id,
            title: self.title,
            description: self.description,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            target_quantity: self.target_quantity,
            phase: self.phase,
            brackets,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const CAMPAIGN_COLUMNS: &str = "id, supplier_org_id, title, description, starts_at, ends_at, \
                                target_quantity, phase, created_at, updated_at";

pub struct PgCampaigns {
    pool: PgPool,
}

impl PgCampaigns {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_brackets(&self, campaign_id: Uuid) -> AppResult<Vec<DiscountBracket>> {
        let brackets = sqlx::query_as::<_, DiscountBracket>(
            r#"
            SELECT position, min_quantity, max_quantity, unit_price
            FROM discount_brackets
            WHERE campaign_id = $1
            ORDER BY position
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(brackets)
    }
}

#[async_trait]
impl CampaignRepository for PgCampaigns {
    async fn insert(&self, campaign: &Campaign) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, supplier_org_id, title, description, starts_at, ends_at,
                target_quantity, phase, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(campaign.id)
        .bind(campaign.supplier_org_id)
        .bind(&campaign.title)
        .bind(&campaign.description)
        .bind(campaign.starts_at)
        .bind(campaign.ends_at)
        .bind(campaign.target_quantity)
        .bind(campaign.phase)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&mut *tx)
        .await?;

        for bracket in &campaign.brackets {
            sqlx::query(
                r#"
                INSERT INTO discount_brackets (campaign_id, position, min_quantity, max_quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(campaign.id)
            .bind(bracket.position)
            .bind(bracket.min_quantity)
            .bind(bracket.max_quantity)
            .bind(bracket.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Campaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let brackets = self.load_brackets(id).await?;
                Ok(Some(row.into_campaign(brackets)))
            }
            None => Ok(None),
        }
    }

    async fn update_draft(&self, campaign: &Campaign) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET title = $2, description = $3, starts_at = $4, ends_at = $5,
                target_quantity = $6, updated_at = NOW()
            WHERE id = $1 AND phase = $7
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.title)
        .bind(&campaign.description)
        .bind(campaign.starts_at)
        .bind(campaign.ends_at)
        .bind(campaign.target_quantity)
        .bind(CampaignPhase::Draft)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Draft campaign {} not found",
                campaign.id
            )));
        }

        sqlx::query("DELETE FROM discount_brackets WHERE campaign_id = $1")
            .bind(campaign.id)
            .execute(&mut *tx)
            .await?;

        for bracket in &campaign.brackets {
            sqlx::query(
                r#"
                INSERT INTO discount_brackets (campaign_id, position, min_quantity, max_quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(campaign.id)
            .bind(bracket.position)
            .bind(bracket.min_quantity)
            .bind(bracket.max_quantity)
            .bind(bracket.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_draft(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1 AND phase = $2")
            .bind(id)
            .bind(CampaignPhase::Draft)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Draft campaign {id} not found")));
        }
        Ok(())
    }

    async fn compare_and_set_phase(
        &self,
        id: Uuid,
        from: CampaignPhase,
        to: CampaignPhase,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET phase = $3, updated_at = NOW()
            WHERE id = $1 AND phase = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_in_phase(&self, phase: CampaignPhase) -> AppResult<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE phase = $1 ORDER BY ends_at"
        ))
        .bind(phase)
        .fetch_all(&self.pool)
        .await?;

        let mut campaigns = Vec::with_capacity(rows.len());
        for row in rows {
            let brackets = self.load_brackets(row.id).await?;
            campaigns.push(row.into_campaign(brackets));
        }
        Ok(campaigns)
    }
}

// ========== PLEDGES ==========

const PLEDGE_COLUMNS: &str =
    "id, campaign_id, buyer_org_id, quantity, status, committed_at, created_at, updated_at";

pub struct PgPledges {
    pool: PgPool,
}

impl PgPledges {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PledgeRepository for PgPledges {
    async fn insert(&self, pledge: &Pledge) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pledges (
                id, campaign_id, buyer_org_id, quantity, status,
                committed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(pledge.id)
        .bind(pledge.campaign_id)
        .bind(pledge.buyer_org_id)
        .bind(pledge.quantity)
        .bind(pledge.status)
        .bind(pledge.committed_at)
        .bind(pledge.created_at)
        .bind(pledge.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "pledges_campaign_buyer_key") {
                PledgeError::DuplicateCommitment.into()
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Pledge>> {
        let pledge = sqlx::query_as::<_, Pledge>(&format!(
            "SELECT {PLEDGE_COLUMNS} FROM pledges WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pledge)
    }

    async fn find_for_buyer(
        &self,
        campaign_id: Uuid,
        buyer_org_id: Uuid,
    ) -> AppResult<Option<Pledge>> {
        let pledge = sqlx::query_as::<_, Pledge>(&format!(
            "SELECT {PLEDGE_COLUMNS} FROM pledges WHERE campaign_id = $1 AND buyer_org_id = $2"
        ))
        .bind(campaign_id)
        .bind(buyer_org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pledge)
    }

    async fn update(&self, pledge: &Pledge) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE pledges
            SET quantity = $2, status = $3, committed_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(pledge.id)
        .bind(pledge.quantity)
        .bind(pledge.status)
        .bind(pledge.committed_at)
        .bind(pledge.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Pledge {} not found", pledge.id)));
        }
        Ok(())
    }

    async fn find_by_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<Pledge>> {
        let pledges = sqlx::query_as::<_, Pledge>(&format!(
            "SELECT {PLEDGE_COLUMNS} FROM pledges WHERE campaign_id = $1 ORDER BY created_at"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pledges)
    }

    async fn find_by_campaign_in_status(
        &self,
        campaign_id: Uuid,
        status: PledgeStatus,
    ) -> AppResult<Vec<Pledge>> {
        let pledges = sqlx::query_as::<_, Pledge>(&format!(
            "SELECT {PLEDGE_COLUMNS} FROM pledges \
             WHERE campaign_id = $1 AND status = $2 ORDER BY created_at"
        ))
        .bind(campaign_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(pledges)
    }

    async fn withdraw_pending(&self, campaign_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE pledges
            SET status = $3, updated_at = NOW()
            WHERE campaign_id = $1 AND status = $2
            "#,
        )
        .bind(campaign_id)
        .bind(PledgeStatus::Pending)
        .bind(PledgeStatus::Withdrawn)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn quantity_in_statuses(
        &self,
        campaign_id: Uuid,
        statuses: &[PledgeStatus],
    ) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT CAST(COALESCE(SUM(quantity), 0) AS BIGINT)
            FROM pledges
            WHERE campaign_id = $1 AND status = ANY($2)
            "#,
        )
        .bind(campaign_id)
        .bind(statuses.to_vec())
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

// ========== PAYMENT INTENTS ==========

const INTENT_COLUMNS: &str = "id, campaign_id, pledge_id, buyer_org_id, amount, status, \
                              retry_count, created_at, updated_at";

pub struct PgPaymentIntents {
    pool: PgPool,
}

impl PgPaymentIntents {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentIntentRepository for PgPaymentIntents {
    async fn insert(&self, intent: &PaymentIntent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                id, campaign_id, pledge_id, buyer_org_id, amount, status,
                retry_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(intent.id)
        .bind(intent.campaign_id)
        .bind(intent.pledge_id)
        .bind(intent.buyer_org_id)
        .bind(intent.amount)
        .bind(intent.status)
        .bind(intent.retry_count)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "payment_intents_pledge_id_key") {
                PaymentError::DuplicateIntent(intent.pledge_id).into()
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn find_by_pledge(&self, pledge_id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let intent = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE pledge_id = $1"
        ))
        .bind(pledge_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(intent)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expect: PaymentIntentStatus,
        next: PaymentIntentStatus,
        retry_count: i32,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = $3, retry_count = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expect)
        .bind(next)
        .bind(retry_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_retryable(&self, max_retries: i32) -> AppResult<Vec<PaymentIntent>> {
        let intents = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents \
             WHERE status = ANY($1) AND retry_count < $2 ORDER BY updated_at"
        ))
        .bind(vec![
            PaymentIntentStatus::FailedRetry1,
            PaymentIntentStatus::FailedRetry2,
        ])
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;

        Ok(intents)
    }

    async fn find_by_campaign(&self, campaign_id: Uuid) -> AppResult<Vec<PaymentIntent>> {
        let intents = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents \
             WHERE campaign_id = $1 ORDER BY created_at"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(intents)
    }

    async fn find_by_buyer(&self, buyer_org_id: Uuid) -> AppResult<Vec<PaymentIntent>> {
        let intents = sqlx::query_as::<_, PaymentIntent>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents \
             WHERE buyer_org_id = $1 ORDER BY created_at"
        ))
        .bind(buyer_org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(intents)
    }
}
