//! Test utilities for database and router testing.
//!
//! Provides an in-memory SQLite database with migrations applied, deterministic
//! provider doubles, and a fully wired router for `oneshot` requests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::{Duration, Utc};
use docsite::{
    auth::{SESSION_COOKIE, sign_session},
    config::AppConfig,
    connectors::{
        DiscordAuthorization, DiscordOAuthProvider, DiscordProfile, ProviderError,
        SponsorshipClient,
    },
    events::{ConnectionUpdated, EventSink},
    models::principal,
    repositories::{NewPrincipal, PrincipalRepository},
    server::{AppState, create_app},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;
use url::Url;

pub const TEST_SESSION_KEY: &str = "integration-test-session-key";

/// Discord account returned by [`StubDiscord`] unless overridden.
pub const DISCORD_ID: i64 = 696628666183975013;
pub const DISCORD_NICKNAME: &str = "Claudio Dekker#3220";
pub const DISCORD_ACCESS_TOKEN: &str = "INVALIDxq3Ly5ca88vy9aUKjLIXdqr";
pub const DISCORD_REFRESH_TOKEN: &str = "INVALIDb8yS0e3Iau0Pn6Q96yUHr9T";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

/// Sets up a file-backed SQLite database with a multi-connection pool, for
/// tests where writers must contend for the database lock.
pub async fn setup_file_db(dir: &std::path::Path) -> Result<Arc<DatabaseConnection>> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("docsite.db").display());
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(8).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

/// Configuration used by router tests.
pub fn test_config(webhook_secret: Option<&str>) -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        session_key: Some(TEST_SESSION_KEY.to_string()),
        webhook_github_secret: webhook_secret.map(str::to_string),
        ..AppConfig::default()
    }
}

/// Deterministic Discord provider.
///
/// Issues authorize URLs on `https://discord.test` and answers every exchange
/// with the configured profile, or fails when `fail_exchange` is set.
#[derive(Debug)]
pub struct StubDiscord {
    pub profile: DiscordProfile,
    pub fail_exchange: bool,
    pub exchanges: AtomicUsize,
}

impl StubDiscord {
    pub fn new() -> Self {
        Self::with_profile(DISCORD_ID, DISCORD_NICKNAME)
    }

    pub fn with_profile(id: i64, nickname: &str) -> Self {
        Self {
            profile: DiscordProfile {
                id,
                nickname: nickname.to_string(),
            },
            fail_exchange: false,
            exchanges: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_exchange: true,
            ..Self::new()
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscordOAuthProvider for StubDiscord {
    fn authorize_url(&self, state: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse("https://discord.test/oauth2/authorize").map_err(|e| {
            ProviderError::Configuration {
                details: e.to_string(),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("scope", "identify connections")
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange(&self, _code: &str) -> Result<DiscordAuthorization, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange {
            return Err(ProviderError::Http {
                provider: "discord",
                status: 400,
                body: Some(r#"{"error":"invalid_grant"}"#.to_string()),
            });
        }

        Ok(DiscordAuthorization {
            access_token: DISCORD_ACCESS_TOKEN.to_string(),
            refresh_token: Some(DISCORD_REFRESH_TOKEN.to_string()),
            expires_at: Some(Utc::now() + Duration::seconds(604_800)),
            scopes: vec!["identify".to_string(), "connections".to_string()],
            profile: self.profile.clone(),
        })
    }
}

/// Sponsorship client with a fixed answer that counts its calls.
#[derive(Debug, Default)]
pub struct StubSponsorship {
    pub sponsoring: bool,
    pub organizations: Vec<String>,
    pub calls: AtomicUsize,
}

impl StubSponsorship {
    pub fn answering(sponsoring: bool) -> Self {
        Self {
            sponsoring,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SponsorshipClient for StubSponsorship {
    async fn is_sponsoring(&self, _account: &str, _token: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sponsoring
    }

    async fn organization_ids(&self, _token: &str) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.organizations.clone()
    }
}

/// Event sink that keeps everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ConnectionUpdated>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ConnectionUpdated> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ConnectionUpdated) {
        self.events.lock().unwrap().push(event);
    }
}

/// A router wired to an in-memory database and test doubles.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub discord: Arc<StubDiscord>,
    pub sponsorship: Arc<StubSponsorship>,
    pub events: Arc<RecordingSink>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::build(test_config(None), StubDiscord::new(), StubSponsorship::default()).await
    }

    pub async fn build(
        config: AppConfig,
        discord: StubDiscord,
        sponsorship: StubSponsorship,
    ) -> Result<Self> {
        let db = setup_test_db().await?;
        let config = Arc::new(config);
        let discord = Arc::new(discord);
        let sponsorship = Arc::new(sponsorship);
        let events = Arc::new(RecordingSink::default());

        let state = AppState::new(
            Arc::clone(&config),
            Arc::clone(&db),
            sponsorship.clone(),
            discord.clone(),
            events.clone(),
        );

        Ok(Self {
            router: create_app(state),
            db,
            config,
            discord,
            sponsorship,
            events,
        })
    }

    pub fn principals(&self) -> PrincipalRepository {
        PrincipalRepository::new(Arc::clone(&self.db))
    }

    pub async fn create_principal(&self, github_token: Option<&str>) -> Result<principal::Model> {
        let principal = self
            .principals()
            .create(NewPrincipal {
                github_id: Some("1".to_string()),
                github_login: Some("octocat".to_string()),
                github_access_token: github_token.map(str::to_string),
            })
            .await?;
        Ok(principal)
    }
}

/// `Cookie` header value signed in as `principal_id`.
pub fn session_cookie(principal_id: uuid::Uuid) -> String {
    format!(
        "{}={}",
        SESSION_COOKIE,
        sign_session(TEST_SESSION_KEY.as_bytes(), principal_id)
    )
}

/// GET request, optionally signed in.
pub fn get(uri: &str, principal_id: Option<uuid::Uuid>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = principal_id {
        builder = builder.header(header::COOKIE, session_cookie(id));
    }
    builder.body(Body::empty()).unwrap()
}

/// Value of the `Location` header.
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Reads the response body as JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extracts the `state` query parameter from an authorize redirect.
pub fn state_param(location: &str) -> String {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}
