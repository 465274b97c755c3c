//! # Data Models
//!
//! This module contains all the data models used throughout the docsite backend.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod discord_connection;
pub mod oauth_state;
pub mod principal;

pub use discord_connection::Entity as DiscordConnection;
pub use oauth_state::Entity as OAuthState;
pub use principal::Entity as Principal;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "docsite".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
