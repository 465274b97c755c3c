//! Principal repository for database operations

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::principal::{self, Entity as Principal};

/// Repository for principal rows
#[derive(Debug, Clone)]
pub struct PrincipalRepository {
    db: Arc<DatabaseConnection>,
}

/// Fields captured from the primary GitHub login
#[derive(Debug, Clone, Default)]
pub struct NewPrincipal {
    pub github_id: Option<String>,
    pub github_login: Option<String>,
    pub github_access_token: Option<String>,
}

impl PrincipalRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a principal and return the stored model
    pub async fn create(&self, new: NewPrincipal) -> Result<principal::Model, sea_orm::DbErr> {
        let now = Utc::now();
        let model = principal::Model {
            id: Uuid::new_v4(),
            github_id: new.github_id,
            github_login: new.github_login,
            github_access_token: new.github_access_token,
            sponsor_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        let active = principal::ActiveModel {
            id: Set(model.id),
            github_id: Set(model.github_id.clone()),
            github_login: Set(model.github_login.clone()),
            github_access_token: Set(model.github_access_token.clone()),
            sponsor_expires_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Principal::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(model)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<principal::Model>, sea_orm::DbErr> {
        Principal::find_by_id(id).one(&*self.db).await
    }

    /// Overwrite the cached sponsorship expiry
    pub async fn set_sponsor_expiry(
        &self,
        id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<principal::Model, sea_orm::DbErr> {
        principal::ActiveModel {
            id: Set(id),
            sponsor_expires_at: Set(expires_at),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&*self.db)
        .await
    }
}
