//! # Principal Model
//!
//! A principal is an account authenticated through the primary GitHub login.
//! It carries the cached sponsorship expiry used to gate sponsor-only content.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "principals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// GitHub numeric account id, stored as text
    pub github_id: Option<String>,

    /// GitHub login handle
    pub github_login: Option<String>,

    /// Access token obtained during the primary GitHub login
    #[serde(skip_serializing)]
    pub github_access_token: Option<String>,

    /// Sponsorship is active while this lies strictly in the future
    pub sponsor_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::discord_connection::Entity")]
    DiscordConnection,
}

impl Related<super::discord_connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscordConnection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
