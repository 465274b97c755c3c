//! Discord connection repository
//!
//! Owns the transactional ownership transfer: linking a Discord account to a
//! principal detaches it from any other principal in the same transaction.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait, sea_query::Expr,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{is_transient_conflict, is_unique_violation};
use crate::models::discord_connection::{self, Entity as DiscordConnection};

/// Attempts made before a contended link is reported as a conflict.
pub const MAX_LINK_ATTEMPTS: u32 = 3;

/// Base delay between link attempts; grows linearly with the attempt number.
const LINK_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Storage failures while linking
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("database error while linking: {0}")]
    Database(#[from] DbErr),

    #[error("link for Discord account {discord_id} kept conflicting after {attempts} attempts")]
    Contended { discord_id: i64, attempts: u32 },
}

/// Values written on every successful link
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub principal_id: Uuid,
    pub discord_id: i64,
    pub nickname: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a committed link
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub connection: discord_connection::Model,
    /// Principal that lost the Discord account, when ownership moved
    pub transferred_from: Option<Uuid>,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct DiscordConnectionRepository {
    db: Arc<DatabaseConnection>,
}

impl DiscordConnectionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<discord_connection::Model>, DbErr> {
        DiscordConnection::find()
            .filter(discord_connection::Column::PrincipalId.eq(principal_id))
            .one(&*self.db)
            .await
    }

    pub async fn find_by_discord_id(
        &self,
        discord_id: i64,
    ) -> Result<Option<discord_connection::Model>, DbErr> {
        DiscordConnection::find()
            .filter(discord_connection::Column::DiscordId.eq(discord_id))
            .one(&*self.db)
            .await
    }

    /// Links the Discord account to the principal, transferring ownership if needed.
    ///
    /// A unique violation, lock timeout or serialization failure from a
    /// concurrent writer rolls the attempt back and the whole unit is retried
    /// against the newly committed state.
    pub async fn link(&self, request: &LinkRequest) -> Result<LinkOutcome, LinkError> {
        let mut attempt = 1;
        loop {
            let error = match self.try_link(request).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_unique_violation(&e) || is_transient_conflict(&e) => e,
                Err(e) => return Err(LinkError::Database(e)),
            };

            if attempt >= MAX_LINK_ATTEMPTS {
                warn!(
                    principal_id = %request.principal_id,
                    discord_id = request.discord_id,
                    error = %error,
                    "Discord link still conflicting, giving up"
                );
                return Err(LinkError::Contended {
                    discord_id: request.discord_id,
                    attempts: attempt,
                });
            }

            warn!(
                principal_id = %request.principal_id,
                discord_id = request.discord_id,
                attempt,
                error = %error,
                "Concurrent Discord link detected, retrying"
            );
            sleep(LINK_RETRY_DELAY * attempt).await;
            attempt += 1;
        }
    }

    async fn try_link(&self, request: &LinkRequest) -> Result<LinkOutcome, DbErr> {
        let txn = self.db.begin().await?;

        match Self::link_in(&txn, request).await {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back Discord link transaction");
                }
                Err(e)
            }
        }
    }

    async fn link_in(
        txn: &DatabaseTransaction,
        request: &LinkRequest,
    ) -> Result<LinkOutcome, DbErr> {
        let now = Utc::now();

        // Write before reading so SQLite takes the write lock up front and
        // Postgres locks the contested row.
        DiscordConnection::update_many()
            .col_expr(discord_connection::Column::UpdatedAt, Expr::value(now))
            .filter(discord_connection::Column::DiscordId.eq(request.discord_id))
            .exec(txn)
            .await?;

        // Detach from any other owner before attaching.
        let mut transferred_from = None;
        if let Some(held) = DiscordConnection::find()
            .filter(discord_connection::Column::DiscordId.eq(request.discord_id))
            .one(txn)
            .await?
            && held.principal_id != request.principal_id
        {
            DiscordConnection::delete_by_id(held.id).exec(txn).await?;
            debug!(
                discord_id = request.discord_id,
                from = %held.principal_id,
                to = %request.principal_id,
                "Detached Discord account from previous owner"
            );
            transferred_from = Some(held.principal_id);
        }

        let current = DiscordConnection::find()
            .filter(discord_connection::Column::PrincipalId.eq(request.principal_id))
            .one(txn)
            .await?;

        match current {
            Some(existing) => {
                let mut active: discord_connection::ActiveModel = existing.into();
                active.discord_id = Set(request.discord_id);
                active.nickname = Set(request.nickname.clone());
                active.access_token = Set(request.access_token.clone());
                active.refresh_token = Set(request.refresh_token.clone());
                active.expires_at = Set(request.expires_at);
                active.updated_at = Set(now);
                let connection = active.update(txn).await?;

                Ok(LinkOutcome {
                    connection,
                    transferred_from,
                    created: false,
                })
            }
            None => {
                let connection = discord_connection::Model {
                    id: Uuid::new_v4(),
                    principal_id: request.principal_id,
                    discord_id: request.discord_id,
                    nickname: request.nickname.clone(),
                    access_token: request.access_token.clone(),
                    refresh_token: request.refresh_token.clone(),
                    expires_at: request.expires_at,
                    created_at: now,
                    updated_at: now,
                };

                let active = discord_connection::ActiveModel {
                    id: Set(connection.id),
                    principal_id: Set(connection.principal_id),
                    discord_id: Set(connection.discord_id),
                    nickname: Set(connection.nickname.clone()),
                    access_token: Set(connection.access_token.clone()),
                    refresh_token: Set(connection.refresh_token.clone()),
                    expires_at: Set(connection.expires_at),
                    created_at: Set(now),
                    updated_at: Set(now),
                };

                DiscordConnection::insert(active)
                    .exec_without_returning(txn)
                    .await?;

                Ok(LinkOutcome {
                    connection,
                    transferred_from,
                    created: true,
                })
            }
        }
    }
}
