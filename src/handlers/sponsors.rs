//! # Sponsor Status Handlers

use axum::{extract::State, response::Json};

use crate::auth::RequirePrincipal;
use crate::error::ApiError;
use crate::server::AppState;
use crate::sponsor_status::SponsorshipRecord;

/// Cached sponsor status of the signed-in principal
///
/// Never contacts GitHub.
#[utoipa::path(
    get,
    path = "/sponsors/status",
    responses(
        (status = 200, description = "Current sponsor status", body = SponsorshipRecord),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "sponsors"
)]
pub async fn status(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Json<SponsorshipRecord> {
    Json(state.sponsors.status(&principal))
}

/// Re-check sponsorship with GitHub
#[utoipa::path(
    post,
    path = "/sponsors/refresh",
    responses(
        (status = 200, description = "Refreshed sponsor status", body = SponsorshipRecord),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "sponsors"
)]
pub async fn refresh(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Result<Json<SponsorshipRecord>, ApiError> {
    let record = state.sponsors.refresh(&principal).await?;
    Ok(Json(record))
}
