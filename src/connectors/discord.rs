//! Discord OAuth2 client
//!
//! Builds the authorization URL, exchanges authorization codes for tokens and
//! reads the authorizing account's profile from `/users/@me`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::DiscordConfig;
use crate::connectors::trait_::{
    DiscordAuthorization, DiscordOAuthProvider, DiscordProfile, ProviderError,
};

const PROVIDER: &str = "discord";

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// `/users/@me` response
#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    global_name: Option<String>,
}

impl DiscordUser {
    /// `username#1234` for legacy accounts, otherwise the global display name.
    fn nickname(&self) -> String {
        match self.discriminator.as_deref() {
            Some(tag) if !tag.is_empty() && tag != "0" => format!("{}#{}", self.username, tag),
            _ => self
                .global_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| self.username.clone()),
        }
    }
}

/// Discord implementation of [`DiscordOAuthProvider`].
#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    oauth_base: String,
    api_base: String,
    scopes: Vec<String>,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration {
                details: format!("failed to build Discord HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            redirect_uri: config.redirect_uri.clone(),
            oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            scopes: config.scopes.clone(),
        })
    }

    async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.api_base))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(status = status.as_u16(), "Discord token exchange rejected");
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER,
                details: format!("token response: {e}"),
            })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<DiscordProfile, ProviderError> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let user: DiscordUser =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: PROVIDER,
                    details: format!("user response: {e}"),
                })?;

        let id = user
            .id
            .parse::<i64>()
            .map_err(|_| ProviderError::MalformedResponse {
                provider: PROVIDER,
                details: format!("non-numeric user id '{}'", user.id),
            })?;

        Ok(DiscordProfile {
            id,
            nickname: user.nickname(),
        })
    }
}

#[async_trait]
impl DiscordOAuthProvider for DiscordClient {
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/oauth2/authorize", self.oauth_base)).map_err(
            |e| ProviderError::Configuration {
                details: format!("invalid Discord OAuth base: {e}"),
            },
        )?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("prompt", "consent");

        Ok(url)
    }

    async fn exchange(&self, code: &str) -> Result<DiscordAuthorization, ProviderError> {
        let token = self.exchange_code_for_token(code).await?;
        let profile = self.fetch_profile(&token.access_token).await?;

        debug!(discord_id = profile.id, "Fetched Discord profile");

        let expires_at = token
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        let scopes = token
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(DiscordAuthorization {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            scopes,
            profile,
        })
    }
}
