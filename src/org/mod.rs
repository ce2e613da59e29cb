use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::error::AppResult;

/// Buyer or supplier organization
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn insert(&self, org: &Organization) -> AppResult<()>;
    async fn find(&self, id: Uuid) -> AppResult<Option<Organization>>;
}
