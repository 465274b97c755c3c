//! # Session Authentication
//!
//! Primary login happens elsewhere; it hands us a signed session cookie
//! `docsite_session=<principal uuid>.<hex HMAC-SHA256(session_key, uuid)>`.
//! Extractors here verify the cookie and load the principal.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::COOKIE, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized};
use crate::models::principal;
use crate::repositories::PrincipalRepository;
use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "docsite_session";

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

fn session_mac(key: &[u8], principal_id: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(principal_id.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Cookie value for `principal_id` signed with `key`.
pub fn sign_session(key: &[u8], principal_id: Uuid) -> String {
    let id = principal_id.to_string();
    let signature = session_mac(key, &id).map(hex::encode).unwrap_or_default();
    format!("{id}.{signature}")
}

/// Verifies a cookie value and returns the principal id it names.
pub fn verify_session(key: &[u8], value: &str) -> Option<Uuid> {
    let (id, signature) = value.rsplit_once('.')?;
    let provided = hex::decode(signature).ok()?;
    let expected = session_mac(key, id)?;

    if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        return None;
    }

    Uuid::parse_str(id).ok()
}

/// Reads a cookie value from the `Cookie` headers.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

/// Principal id carried by a valid session cookie, if any.
pub fn session_principal_id(headers: &HeaderMap, key: &[u8]) -> Option<Uuid> {
    cookie_value(headers, SESSION_COOKIE).and_then(|value| verify_session(key, value))
}

/// The signed-in principal, or `None` for guests.
///
/// A cookie that fails verification, or names a principal that no longer
/// exists, yields `None`.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Option<principal::Model>);

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = state.config.session_key_bytes();
        let Some(principal_id) = session_principal_id(&parts.headers, &key) else {
            return Ok(Self(None));
        };

        let principal = PrincipalRepository::new(Arc::clone(&state.db))
            .find_by_id(principal_id)
            .await?;

        if principal.is_none() {
            tracing::debug!(principal_id = %principal_id, "Session references unknown principal");
        }

        Ok(Self(principal))
    }
}

/// Like [`CurrentPrincipal`] but rejects guests with 401.
#[derive(Debug, Clone)]
pub struct RequirePrincipal(pub principal::Model);

impl FromRequestParts<AppState> for RequirePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentPrincipal::from_request_parts(parts, state).await? {
            CurrentPrincipal(Some(principal)) => Ok(Self(principal)),
            CurrentPrincipal(None) => Err(unauthorized(None)),
        }
    }
}
