//! # Discord Connection Handlers
//!
//! Browser-facing endpoints of the Discord linking flow. Guests are sent to
//! the primary login; every invalid callback sends the user back to the
//! start of the flow.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tracing::debug;

use crate::auth::{CurrentPrincipal, RequirePrincipal};
use crate::connect_flow::{CallbackOutcome, CallbackParams};
use crate::error::{ApiError, authorization_cancelled, not_found};
use crate::models::discord_connection::DiscordConnectionInfo;
use crate::repositories::DiscordConnectionRepository;
use crate::server::AppState;

/// Path of the connect-start endpoint
pub const AUTHORIZE_PATH: &str = "/connections/discord/authorize";

/// Path of the provider redirect target
pub const CALLBACK_PATH: &str = "/connections/discord/authorize/callback";

/// Start linking a Discord account
///
/// Redirects guests to the primary login and signed-in principals to the
/// Discord consent screen.
#[utoipa::path(
    get,
    path = "/connections/discord/authorize",
    responses(
        (status = 303, description = "Redirect to Discord, or to primary login for guests"),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn authorize(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Redirect, ApiError> {
    let Some(principal) = principal else {
        debug!("Guest attempted to start Discord connection");
        return Ok(Redirect::to(&state.config.primary_auth_url));
    };

    let url = state.connect_flow.start(principal.id).await?;
    Ok(Redirect::to(url.as_str()))
}

/// Discord OAuth callback
///
/// Links the account on success. `error=access_denied` answers 428 without a
/// redirect; every other failure restarts the flow.
#[utoipa::path(
    get,
    path = "/connections/discord/authorize/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Redirect to the post-link destination, to the start of the flow, or to primary login"),
        (status = 409, description = "Account was linked concurrently", body = ApiError),
        (status = 428, description = "User cancelled the authorization", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn callback(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let Some(principal) = principal else {
        return Ok(Redirect::to(&state.config.primary_auth_url).into_response());
    };

    let response = match state.connect_flow.callback(principal.id, params).await? {
        CallbackOutcome::Linked(_) => {
            Redirect::to(&state.config.discord.post_link_url).into_response()
        }
        CallbackOutcome::Cancelled { description } => {
            authorization_cancelled("Discord", description.as_deref()).into_response()
        }
        CallbackOutcome::Invalid(_) => Redirect::to(AUTHORIZE_PATH).into_response(),
    };

    Ok(response)
}

/// Linked Discord account of the signed-in principal
#[utoipa::path(
    get,
    path = "/connections/discord",
    responses(
        (status = 200, description = "Linked account", body = DiscordConnectionInfo),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "No Discord account linked", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn show(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Result<Json<DiscordConnectionInfo>, ApiError> {
    let connection = DiscordConnectionRepository::new(state.db.clone())
        .find_by_principal(principal.id)
        .await?
        .ok_or_else(|| not_found("Discord connection"))?;

    Ok(Json(connection.into()))
}
