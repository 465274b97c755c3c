//! Capability traits for the external providers the service talks to.
//!
//! Both traits are object safe so the orchestrator and evaluator can hold
//! `Arc<dyn ...>` and tests can substitute deterministic doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Errors raised by OAuth provider calls
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error talking to {provider}: {details}")]
    Network {
        provider: &'static str,
        details: String,
    },

    #[error("{provider} returned HTTP {status}")]
    Http {
        provider: &'static str,
        status: u16,
        body: Option<String>,
    },

    #[error("malformed response from {provider}: {details}")]
    MalformedResponse {
        provider: &'static str,
        details: String,
    },

    #[error("provider configuration error: {details}")]
    Configuration { details: String },
}

impl ProviderError {
    pub(crate) fn network(provider: &'static str, error: reqwest::Error) -> Self {
        Self::Network {
            provider,
            details: error.to_string(),
        }
    }
}

/// Answers sponsorship and organization questions on behalf of a token's owner.
///
/// Implementations never fail: remote errors are reported as the conservative
/// answer (`false` or an empty list).
#[async_trait]
pub trait SponsorshipClient: Send + Sync {
    /// Whether the owner of `token` sponsors `account` (a user or an organization).
    async fn is_sponsoring(&self, account: &str, token: &str) -> bool;

    /// Ids of the organizations the owner of `token` belongs to.
    async fn organization_ids(&self, token: &str) -> Vec<String>;
}

/// Profile of the Discord account that granted authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordProfile {
    pub id: i64,
    pub nickname: String,
}

/// Result of a successful authorization-code exchange.
#[derive(Debug, Clone)]
pub struct DiscordAuthorization {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub profile: DiscordProfile,
}

/// The OAuth provider used to link Discord accounts.
#[async_trait]
pub trait DiscordOAuthProvider: Send + Sync {
    /// Authorization URL the browser is redirected to.
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError>;

    /// Exchanges `code` for tokens and fetches the account profile.
    async fn exchange(&self, code: &str) -> Result<DiscordAuthorization, ProviderError>;
}
