//! Connectors module
//!
//! Clients for the external providers this service depends on:
//! - The capability traits the core logic is written against
//! - GitHub GraphQL sponsorship lookups
//! - Discord OAuth2 account linking

pub mod discord;
pub mod github;
pub mod trait_;

pub use discord::DiscordClient;
pub use github::GitHubSponsorshipClient;
pub use trait_::{
    DiscordAuthorization, DiscordOAuthProvider, DiscordProfile, ProviderError, SponsorshipClient,
};
