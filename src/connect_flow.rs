//! Discord account linking flow.
//!
//! `start` issues a single-use state token and returns the provider authorize
//! URL. `callback` validates the returned state, exchanges the code and links
//! the account, moving it away from any previous owner atomically.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::connectors::{DiscordOAuthProvider, ProviderError};
use crate::error::ApiError;
use crate::events::{ConnectionUpdated, EventSink};
use crate::repositories::{
    DiscordConnectionRepository, LinkError, LinkOutcome, LinkRequest, OAuthStateRepository,
};

/// Provider name recorded on issued state tokens
pub const DISCORD_PROVIDER: &str = "discord";

/// Error code Discord sends when the user declines the consent screen
const ACCESS_DENIED: &str = "access_denied";

/// Query parameters on the provider's redirect back to us
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code, present on success
    pub code: Option<String>,
    /// State token issued by the start step
    pub state: Option<String>,
    /// Provider error code, e.g. `access_denied`
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Why a callback could not complete; the remedy is always to restart the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidCallback {
    MissingState,
    UnknownState,
    ExpiredState,
    StateIssuedToAnotherPrincipal,
    ProviderError(String),
    MissingCode,
    ExchangeFailed,
}

impl InvalidCallback {
    fn as_str(&self) -> &'static str {
        match self {
            InvalidCallback::MissingState => "missing_state",
            InvalidCallback::UnknownState => "unknown_state",
            InvalidCallback::ExpiredState => "expired_state",
            InvalidCallback::StateIssuedToAnotherPrincipal => "state_principal_mismatch",
            InvalidCallback::ProviderError(_) => "provider_error",
            InvalidCallback::MissingCode => "missing_code",
            InvalidCallback::ExchangeFailed => "exchange_failed",
        }
    }
}

/// Terminal states of a callback
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    Linked(LinkOutcome),
    Cancelled { description: Option<String> },
    Invalid(InvalidCallback),
}

/// Failures that are not part of the flow's normal outcomes
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("state storage failed: {0}")]
    Storage(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("unable to build authorization URL: {0}")]
    Provider(#[from] ProviderError),
}

impl From<FlowError> for ApiError {
    fn from(error: FlowError) -> Self {
        match error {
            FlowError::Storage(e) | FlowError::Link(LinkError::Database(e)) => e.into(),
            FlowError::Link(contended @ LinkError::Contended { .. }) => {
                warn!(error = %contended, "Discord link gave up after repeated conflicts");
                ApiError::new(
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "Discord account is being linked concurrently, try again",
                )
            }
            FlowError::Provider(e) => {
                tracing::error!(error = %e, "Discord provider misconfigured");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Discord connection is not available",
                )
            }
        }
    }
}

pub struct ConnectionOrchestrator {
    provider: Arc<dyn DiscordOAuthProvider>,
    states: OAuthStateRepository,
    connections: DiscordConnectionRepository,
    events: Arc<dyn EventSink>,
    state_ttl_minutes: i64,
}

impl ConnectionOrchestrator {
    pub fn new(
        provider: Arc<dyn DiscordOAuthProvider>,
        states: OAuthStateRepository,
        connections: DiscordConnectionRepository,
        events: Arc<dyn EventSink>,
        state_ttl_minutes: i64,
    ) -> Self {
        Self {
            provider,
            states,
            connections,
            events,
            state_ttl_minutes,
        }
    }

    /// Issues a state token for `principal_id` and returns the authorize URL.
    pub async fn start(&self, principal_id: Uuid) -> Result<Url, FlowError> {
        let state = generate_secure_state();
        let url = self.provider.authorize_url(&state)?;

        self.states
            .create(principal_id, DISCORD_PROVIDER, &state, self.state_ttl_minutes)
            .await?;

        info!(principal_id = %principal_id, "Started Discord connection flow");
        Ok(url)
    }

    /// Completes the flow for `principal_id` with the provider's redirect parameters.
    pub async fn callback(
        &self,
        principal_id: Uuid,
        params: CallbackParams,
    ) -> Result<CallbackOutcome, FlowError> {
        let outcome = self.resolve_callback(principal_id, params).await;

        let label = match &outcome {
            Ok(CallbackOutcome::Linked(_)) => "linked",
            Ok(CallbackOutcome::Cancelled { .. }) => "cancelled",
            Ok(CallbackOutcome::Invalid(_)) => "invalid",
            Err(_) => "error",
        };
        counter!("discord_link_total", "outcome" => label).increment(1);

        outcome
    }

    async fn resolve_callback(
        &self,
        principal_id: Uuid,
        params: CallbackParams,
    ) -> Result<CallbackOutcome, FlowError> {
        if let Some(error) = params.error.as_deref() {
            // Burn the caller's own state so it cannot be replayed with a code later.
            if let Some(state) = params.state.as_deref() {
                self.states
                    .discard_for(DISCORD_PROVIDER, state, principal_id)
                    .await?;
            }

            if error == ACCESS_DENIED {
                info!(principal_id = %principal_id, "Discord authorization cancelled by user");
                return Ok(CallbackOutcome::Cancelled {
                    description: params.error_description,
                });
            }

            warn!(principal_id = %principal_id, error, "Discord returned an authorization error");
            return Ok(CallbackOutcome::Invalid(InvalidCallback::ProviderError(
                error.to_string(),
            )));
        }

        let Some(state) = params.state.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(self.invalid(principal_id, InvalidCallback::MissingState));
        };

        // Another principal's state is rejected without consuming it.
        match self.states.find(DISCORD_PROVIDER, state).await? {
            Some(found) if found.principal_id != principal_id => {
                return Ok(self.invalid(
                    principal_id,
                    InvalidCallback::StateIssuedToAnotherPrincipal,
                ));
            }
            Some(_) => {}
            None => return Ok(self.invalid(principal_id, InvalidCallback::UnknownState)),
        }

        let Some(issued) = self.states.consume(DISCORD_PROVIDER, state).await? else {
            return Ok(self.invalid(principal_id, InvalidCallback::UnknownState));
        };

        if !issued.is_live_at(Utc::now()) {
            return Ok(self.invalid(principal_id, InvalidCallback::ExpiredState));
        }

        let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
            return Ok(self.invalid(principal_id, InvalidCallback::MissingCode));
        };

        let authorization = match self.provider.exchange(code).await {
            Ok(authorization) => authorization,
            Err(e) => {
                warn!(principal_id = %principal_id, error = %e, "Discord code exchange failed");
                return Ok(CallbackOutcome::Invalid(InvalidCallback::ExchangeFailed));
            }
        };

        let request = LinkRequest {
            principal_id,
            discord_id: authorization.profile.id,
            nickname: authorization.profile.nickname,
            access_token: authorization.access_token,
            refresh_token: authorization.refresh_token,
            expires_at: authorization.expires_at,
        };

        let linked = self.connections.link(&request).await?;

        info!(
            principal_id = %principal_id,
            discord_id = linked.connection.discord_id,
            created = linked.created,
            transferred_from = ?linked.transferred_from,
            "Linked Discord account"
        );

        self.events.publish(ConnectionUpdated {
            principal_id,
            connection_id: linked.connection.id,
            discord_id: linked.connection.discord_id,
            nickname: linked.connection.nickname.clone(),
            transferred_from: linked.transferred_from,
        });

        Ok(CallbackOutcome::Linked(linked))
    }

    fn invalid(&self, principal_id: Uuid, reason: InvalidCallback) -> CallbackOutcome {
        warn!(
            principal_id = %principal_id,
            reason = reason.as_str(),
            "Rejected Discord callback"
        );
        CallbackOutcome::Invalid(reason)
    }
}

/// 32 random bytes, base64url encoded.
fn generate_secure_state() -> String {
    use rand::Rng;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);

    base64_url::encode(&bytes)
}
