//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! principal, Discord connection and OAuth state tables.

pub mod discord_connection;
pub mod oauth_state;
pub mod principal;

pub use discord_connection::{
    DiscordConnectionRepository, LinkError, LinkOutcome, LinkRequest, MAX_LINK_ATTEMPTS,
};
pub use oauth_state::OAuthStateRepository;
pub use principal::{NewPrincipal, PrincipalRepository};
