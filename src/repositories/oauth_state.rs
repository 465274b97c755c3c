//! # OAuth State Repository
//!
//! Persists single-use CSRF state tokens for connection flows.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::oauth_state::{self, ActiveModel, Entity, Model};

/// Repository for OAuth state database operations
#[derive(Debug, Clone)]
pub struct OAuthStateRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthStateRepository {
    /// Create a new OAuth state repository
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a freshly issued state token
    pub async fn create(
        &self,
        principal_id: Uuid,
        provider: &str,
        state: &str,
        expires_in_minutes: i64,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let model = Model {
            id: Uuid::new_v4(),
            principal_id,
            provider: provider.to_string(),
            state: state.to_string(),
            expires_at: now + Duration::minutes(expires_in_minutes),
            created_at: now,
        };

        let active = ActiveModel {
            id: Set(model.id),
            principal_id: Set(model.principal_id),
            provider: Set(model.provider.clone()),
            state: Set(model.state.clone()),
            expires_at: Set(model.expires_at),
            created_at: Set(model.created_at),
        };

        // exec_without_returning sidesteps UnpackInsertId on SQLite uuid keys
        Entity::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(model)
    }

    /// Look up a state token without consuming it
    pub async fn find(&self, provider: &str, state: &str) -> Result<Option<Model>, sea_orm::DbErr> {
        Entity::find()
            .filter(oauth_state::Column::Provider.eq(provider))
            .filter(oauth_state::Column::State.eq(state))
            .one(&*self.db)
            .await
    }

    /// Look up a state token and delete it in the same step.
    ///
    /// Returns the row only to the caller whose delete removed it, so a token
    /// can be redeemed once even under concurrent callbacks. Expired rows are
    /// returned as well; the caller decides what an expired state means.
    pub async fn consume(
        &self,
        provider: &str,
        state: &str,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        let Some(found) = self.find(provider, state).await? else {
            return Ok(None);
        };

        let deleted = Entity::delete_by_id(found.id).exec(&*self.db).await?;
        if deleted.rows_affected == 0 {
            return Ok(None);
        }

        Ok(Some(found))
    }

    /// Delete a state token only if it was issued to `principal_id`.
    ///
    /// Returns whether a row was removed. Tokens belonging to someone else are
    /// left untouched.
    pub async fn discard_for(
        &self,
        provider: &str,
        state: &str,
        principal_id: Uuid,
    ) -> Result<bool, sea_orm::DbErr> {
        let result = Entity::delete_many()
            .filter(oauth_state::Column::Provider.eq(provider))
            .filter(oauth_state::Column::State.eq(state))
            .filter(oauth_state::Column::PrincipalId.eq(principal_id))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Remove states that expired before `now`
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, sea_orm::DbErr> {
        let result = Entity::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lt(now))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
