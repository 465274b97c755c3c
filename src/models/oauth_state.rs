//! # OAuth State Model
//!
//! Single-use CSRF state tokens issued when a principal starts a connection flow.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Principal that started the flow
    pub principal_id: Uuid,

    /// Provider name (e.g., "discord")
    pub provider: String,

    /// State token generated for CSRF protection
    #[sea_orm(unique)]
    pub state: String,

    pub expires_at: chrono::DateTime<chrono::Utc>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the state is still usable at `now`
    pub fn is_live_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at > now
    }
}
