//! Configuration loading for the docsite backend.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `DOCSITE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ENV_PREFIX: &str = "DOCSITE_";

/// Signing key used for session cookies when running locally without one configured.
const LOCAL_SESSION_KEY: &str = "docsite-local-development-session-key";

/// Application configuration derived from `DOCSITE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    /// Where guests are sent to log in before starting a connection flow
    #[serde(default = "default_primary_auth_url")]
    pub primary_auth_url: String,
    /// Shared secret for GitHub webhook signatures; unset disables verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_github_secret: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
    /// Account whose sponsors get access
    #[serde(default = "default_github_sponsor_target")]
    pub github_sponsor_target: String,
    #[serde(default = "default_sponsor_expiry_days")]
    pub sponsor_expiry_days: u32,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default = "default_oauth_state_ttl_minutes")]
    pub oauth_state_ttl_minutes: i64,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

/// Discord OAuth application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default = "default_discord_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_discord_oauth_base")]
    pub oauth_base: String,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
    #[serde(default = "default_discord_scopes")]
    pub scopes: Vec<String>,
    /// Destination after a successful link
    #[serde(default = "default_discord_post_link_url")]
    pub post_link_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            session_key: None,
            primary_auth_url: default_primary_auth_url(),
            webhook_github_secret: None,
            github_api_base: default_github_api_base(),
            github_sponsor_target: default_github_sponsor_target(),
            sponsor_expiry_days: default_sponsor_expiry_days(),
            discord: DiscordConfig::default(),
            oauth_state_ttl_minutes: default_oauth_state_ttl_minutes(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_discord_redirect_uri(),
            oauth_base: default_discord_oauth_base(),
            api_base: default_discord_api_base(),
            scopes: default_discord_scopes(),
            post_link_url: default_discord_post_link_url(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    fn is_local_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Key material for session cookie signatures.
    ///
    /// Local and test profiles fall back to a fixed development key; other
    /// profiles are rejected by [`AppConfig::validate`] before this is reached.
    pub fn session_key_bytes(&self) -> Vec<u8> {
        match self.session_key.as_deref() {
            Some(key) => key.as_bytes().to_vec(),
            None => LOCAL_SESSION_KEY.as_bytes().to_vec(),
        }
    }

    /// Webhook secret with empty values treated as unset.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_github_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.session_key.is_some() {
            config.session_key = Some("[REDACTED]".to_string());
        }
        if config.webhook_github_secret.is_some() {
            config.webhook_github_secret = Some("[REDACTED]".to_string());
        }
        if config.discord.client_id.is_some() {
            config.discord.client_id = Some("[REDACTED]".to_string());
        }
        if config.discord.client_secret.is_some() {
            config.discord.client_secret = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_local_profile() {
            if self.session_key.is_none() {
                return Err(ConfigError::MissingSessionKey);
            }
            if self.discord.client_id.is_none() {
                return Err(ConfigError::MissingDiscordClientId);
            }
            if self.discord.client_secret.is_none() {
                return Err(ConfigError::MissingDiscordClientSecret);
            }
        }

        if self.sponsor_expiry_days == 0 {
            return Err(ConfigError::InvalidSponsorExpiry {
                value: self.sponsor_expiry_days,
            });
        }

        if !(1..=60).contains(&self.oauth_state_ttl_minutes) {
            return Err(ConfigError::InvalidOAuthStateTtl {
                value: self.oauth_state_ttl_minutes,
            });
        }

        if self.http_timeout_seconds == 0 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_seconds,
            });
        }

        if self.discord.scopes.is_empty() {
            return Err(ConfigError::EmptyDiscordScopes);
        }

        for (key, value) in [
            ("GITHUB_API_BASE", &self.github_api_base),
            ("DISCORD_REDIRECT_URI", &self.discord.redirect_uri),
            ("DISCORD_OAUTH_BASE", &self.discord.oauth_base),
            ("DISCORD_API_BASE", &self.discord.api_base),
            ("DISCORD_POST_LINK_URL", &self.discord.post_link_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                key,
                value: value.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://docsite.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_primary_auth_url() -> String {
    "/auth/github".to_string()
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_github_sponsor_target() -> String {
    "inertiajs".to_string()
}

fn default_sponsor_expiry_days() -> u32 {
    30
}

fn default_discord_redirect_uri() -> String {
    "http://localhost:8080/connections/discord/authorize/callback".to_string()
}

fn default_discord_oauth_base() -> String {
    "https://discord.com".to_string()
}

fn default_discord_api_base() -> String {
    "https://discord.com/api".to_string()
}

fn default_discord_scopes() -> Vec<String> {
    vec!["identify".to_string(), "connections".to_string()]
}

fn default_discord_post_link_url() -> String {
    "https://discord.com/channels/592327939920494592/592327939920494594".to_string()
}

fn default_oauth_state_ttl_minutes() -> i64 {
    15
}

fn default_http_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("session key is missing; set DOCSITE_SESSION_KEY environment variable")]
    MissingSessionKey,
    #[error("Discord client ID is missing; set DOCSITE_DISCORD_CLIENT_ID environment variable")]
    MissingDiscordClientId,
    #[error(
        "Discord client secret is missing; set DOCSITE_DISCORD_CLIENT_SECRET environment variable"
    )]
    MissingDiscordClientSecret,
    #[error("Discord scopes cannot be empty")]
    EmptyDiscordScopes,
    #[error("sponsor expiry must be at least one day, got {value}")]
    InvalidSponsorExpiry { value: u32 },
    #[error("OAuth state TTL must be between 1 and 60 minutes, got {value}")]
    InvalidOAuthStateTtl { value: i64 },
    #[error("HTTP timeout must be positive, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("invalid number for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("invalid URL for {key} '{value}': {source}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        source: url::ParseError,
    },
}

/// Loads configuration using layered `.env` files and `DOCSITE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads, validates and returns the layered configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Process environment wins over every file layer.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        // Empty values behave as if the key were absent.
        layered.retain(|_, value| !value.trim().is_empty());

        let profile = layered.remove("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .unwrap_or_else(default_database_url);
        let db_max_connections = parse_number(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = parse_number(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let session_key = layered.remove("SESSION_KEY");
        let primary_auth_url = layered
            .remove("PRIMARY_AUTH_URL")
            .unwrap_or_else(default_primary_auth_url);
        let webhook_github_secret = layered.remove("WEBHOOK_GITHUB_SECRET");
        let github_api_base = layered
            .remove("GITHUB_API_BASE")
            .unwrap_or_else(default_github_api_base);
        let github_sponsor_target = layered
            .remove("GITHUB_SPONSOR_TARGET")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(default_github_sponsor_target);
        let sponsor_expiry_days = parse_number(&mut layered, "SPONSOR_EXPIRY_DAYS")?
            .unwrap_or_else(default_sponsor_expiry_days);

        let discord = DiscordConfig {
            client_id: layered
                .remove("DISCORD_CLIENT_ID")
                .map(|v| v.trim().to_string()),
            client_secret: layered
                .remove("DISCORD_CLIENT_SECRET")
                .map(|v| v.trim().to_string()),
            redirect_uri: layered
                .remove("DISCORD_REDIRECT_URI")
                .unwrap_or_else(default_discord_redirect_uri),
            oauth_base: layered
                .remove("DISCORD_OAUTH_BASE")
                .unwrap_or_else(default_discord_oauth_base),
            api_base: layered
                .remove("DISCORD_API_BASE")
                .unwrap_or_else(default_discord_api_base),
            scopes: layered
                .remove("DISCORD_SCOPES")
                .map(|scopes| {
                    scopes
                        .split([',', ' '])
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(default_discord_scopes),
            post_link_url: layered
                .remove("DISCORD_POST_LINK_URL")
                .unwrap_or_else(default_discord_post_link_url),
        };

        let oauth_state_ttl_minutes = parse_number(&mut layered, "OAUTH_STATE_TTL_MINUTES")?
            .unwrap_or_else(default_oauth_state_ttl_minutes);
        let http_timeout_seconds = parse_number(&mut layered, "HTTP_TIMEOUT_SECONDS")?
            .unwrap_or_else(default_http_timeout_seconds);

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            session_key,
            primary_auth_url,
            webhook_github_secret,
            github_api_base,
            github_sponsor_target,
            sponsor_expiry_days,
            discord,
            oauth_state_ttl_minutes,
            http_timeout_seconds,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match layered.remove(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_for_local_profile() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.oauth_state_ttl_minutes, 15);
        assert_eq!(config.sponsor_expiry_days, 30);
        assert_eq!(config.discord.scopes, vec!["identify", "connections"]);
    }

    #[test]
    fn production_requires_secrets() {
        let mut config = AppConfig {
            profile: "prod".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSessionKey)
        ));

        config.session_key = Some("k".repeat(32));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDiscordClientId)
        ));

        config.discord.client_id = Some("id".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDiscordClientSecret)
        ));

        config.discord.client_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn state_ttl_bounds() {
        for value in [0, 61, -5] {
            let config = AppConfig {
                oauth_state_ttl_minutes: value,
                ..AppConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidOAuthStateTtl { .. })
            ));
        }
    }

    #[test]
    fn zero_values_rejected() {
        let config = AppConfig {
            sponsor_expiry_days: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSponsorExpiry { value: 0 })
        ));

        let config = AppConfig {
            http_timeout_seconds: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHttpTimeout { value: 0 })
        ));
    }

    #[test]
    fn malformed_url_rejected() {
        let mut config = AppConfig::default();
        config.discord.post_link_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl {
                key: "DISCORD_POST_LINK_URL",
                ..
            })
        ));
    }

    #[test]
    fn empty_webhook_secret_counts_as_unset() {
        let config = AppConfig {
            webhook_github_secret: Some(String::new()),
            ..AppConfig::default()
        };
        assert!(config.webhook_secret().is_none());
    }

    #[test]
    fn redaction_hides_secrets() {
        let mut config = AppConfig {
            session_key: Some("session-secret".to_string()),
            webhook_github_secret: Some("hook-secret".to_string()),
            ..AppConfig::default()
        };
        config.discord.client_secret = Some("discord-secret".to_string());

        let json = config.redacted_json().unwrap();
        assert!(!json.contains("session-secret"));
        assert!(!json.contains("hook-secret"));
        assert!(!json.contains("discord-secret"));
        assert!(json.contains("[REDACTED]"));
    }
}
