//! # Discord Connection Model
//!
//! Links one principal to one Discord account. At most one row may exist per
//! principal and per Discord account id.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discord_connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning principal
    #[sea_orm(unique)]
    pub principal_id: Uuid,

    /// Discord snowflake id
    #[sea_orm(unique)]
    pub discord_id: i64,

    /// Display name captured at link time
    pub nickname: String,

    #[serde(skip_serializing)]
    pub access_token: String,

    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,

    /// Access token expiry, when the provider reported a lifetime
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::principal::Entity",
        from = "Column::PrincipalId",
        to = "super::principal::Column::Id",
        on_delete = "Cascade"
    )]
    Principal,
}

impl Related<super::principal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Principal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Public view of a linked Discord account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscordConnectionInfo {
    pub id: Uuid,
    /// Discord snowflake id as a string
    pub discord_id: String,
    pub nickname: String,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Model> for DiscordConnectionInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            discord_id: model.discord_id.to_string(),
            nickname: model.nickname,
            expires_at: model.expires_at,
        }
    }
}
