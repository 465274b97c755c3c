//! # Server Configuration
//!
//! This module contains the server setup and configuration for the docsite API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::connect_flow::ConnectionOrchestrator;
use crate::connectors::{
    DiscordClient, DiscordOAuthProvider, GitHubSponsorshipClient, ProviderError, SponsorshipClient,
};
use crate::events::EventSink;
use crate::handlers;
use crate::repositories::{DiscordConnectionRepository, OAuthStateRepository, PrincipalRepository};
use crate::sponsor_status::SponsorStatusEvaluator;
use crate::telemetry::trace_context_middleware;
use crate::webhook_verification::{
    MAX_WEBHOOK_BODY_BYTES, SignatureVerifier, webhook_verification_middleware,
};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub verifier: SignatureVerifier,
    pub connect_flow: Arc<ConnectionOrchestrator>,
    pub sponsors: Arc<SponsorStatusEvaluator>,
}

impl AppState {
    /// Wires the core components around the given provider capabilities.
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        sponsorship: Arc<dyn SponsorshipClient>,
        discord: Arc<dyn DiscordOAuthProvider>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let verifier = SignatureVerifier::new(config.webhook_secret().map(str::to_string));

        let connect_flow = ConnectionOrchestrator::new(
            discord,
            OAuthStateRepository::new(Arc::clone(&db)),
            DiscordConnectionRepository::new(Arc::clone(&db)),
            events,
            config.oauth_state_ttl_minutes,
        );

        let sponsors = SponsorStatusEvaluator::new(
            sponsorship,
            PrincipalRepository::new(Arc::clone(&db)),
            config.github_sponsor_target.clone(),
            config.sponsor_expiry_days,
        );

        Self {
            config,
            db,
            verifier,
            connect_flow: Arc::new(connect_flow),
            sponsors: Arc::new(sponsors),
        }
    }

    /// State backed by the real GitHub and Discord clients.
    pub fn with_remote_clients(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.http_timeout_seconds);
        let sponsorship = GitHubSponsorshipClient::new(&config.github_api_base, timeout)?;
        let discord = DiscordClient::new(&config.discord, timeout)?;

        Ok(Self::new(
            config,
            db,
            Arc::new(sponsorship),
            Arc::new(discord),
            events,
        ))
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let webhooks = Router::new()
        .route("/webhooks/github", post(handlers::webhooks::github_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            webhook_verification_middleware,
        ))
        .route_layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY_BYTES));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            handlers::connect::AUTHORIZE_PATH,
            get(handlers::connect::authorize),
        )
        .route(
            handlers::connect::CALLBACK_PATH,
            get(handlers::connect::callback),
        )
        .route("/connections/discord", get(handlers::connect::show))
        .route("/sponsors/status", get(handlers::sponsors::status))
        .route("/sponsors/refresh", post(handlers::sponsors::refresh))
        .merge(webhooks)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: &AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);

    // Resolve the configured bind address
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::webhooks::github_webhook,
        crate::handlers::connect::authorize,
        crate::handlers::connect::callback,
        crate::handlers::connect::show,
        crate::handlers::sponsors::status,
        crate::handlers::sponsors::refresh,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::handlers::webhooks::WebhookAcceptResponse,
            crate::models::discord_connection::DiscordConnectionInfo,
            crate::sponsor_status::SponsorshipRecord,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "webhooks", description = "Signed GitHub webhook deliveries"),
        (name = "connections", description = "Discord account linking"),
        (name = "sponsors", description = "GitHub sponsor status"),
    ),
    info(
        title = "Docsite API",
        description = "Webhook intake, Discord account linking and sponsor status",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/",
            "/healthz",
            "/webhooks/github",
            "/connections/discord/authorize",
            "/connections/discord/authorize/callback",
            "/connections/discord",
            "/sponsors/status",
            "/sponsors/refresh",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
