//! Sponsor status derived from the cached sponsorship expiry.
//!
//! Checks are pure comparisons against the stored expiry. Only
//! [`SponsorStatusEvaluator::refresh`] talks to GitHub and only it mutates the
//! cached expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::connectors::SponsorshipClient;
use crate::models::principal;
use crate::repositories::PrincipalRepository;

/// Derived sponsorship view of a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SponsorshipRecord {
    /// Whether sponsor-only content is unlocked right now
    pub active: bool,
    /// Cached expiry; `null` when never sponsored or lapsed at the last check
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SponsorshipRecord {
    pub fn at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            active: is_active_at(expires_at, now),
            expires_at,
        }
    }
}

/// True iff `expires_at` is present and strictly after `now`.
pub fn is_active_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expiry| expiry > now)
}

pub struct SponsorStatusEvaluator {
    client: Arc<dyn SponsorshipClient>,
    principals: PrincipalRepository,
    target_account: String,
    expiry: Duration,
}

impl SponsorStatusEvaluator {
    pub fn new(
        client: Arc<dyn SponsorshipClient>,
        principals: PrincipalRepository,
        target_account: impl Into<String>,
        expiry_days: u32,
    ) -> Self {
        Self {
            client,
            principals,
            target_account: target_account.into(),
            expiry: Duration::days(i64::from(expiry_days)),
        }
    }

    pub fn has_active_sponsor(&self, principal: &principal::Model) -> bool {
        self.has_active_sponsor_at(principal, Utc::now())
    }

    pub fn has_active_sponsor_at(&self, principal: &principal::Model, now: DateTime<Utc>) -> bool {
        is_active_at(principal.sponsor_expires_at, now)
    }

    /// Current cached status, without any network call.
    pub fn status(&self, principal: &principal::Model) -> SponsorshipRecord {
        SponsorshipRecord::at(principal.sponsor_expires_at, Utc::now())
    }

    /// Re-checks sponsorship with the principal's own GitHub token.
    ///
    /// Forward-dates the expiry when sponsoring, clears it otherwise. A
    /// principal without a token is treated as not sponsoring.
    pub async fn refresh(
        &self,
        principal: &principal::Model,
    ) -> Result<SponsorshipRecord, sea_orm::DbErr> {
        let sponsoring = match principal.github_access_token.as_deref() {
            Some(token) if !token.is_empty() => {
                self.client
                    .is_sponsoring(&self.target_account, token)
                    .await
            }
            _ => false,
        };

        let now = Utc::now();
        let expires_at = sponsoring.then(|| now + self.expiry);

        let updated = self
            .principals
            .set_sponsor_expiry(principal.id, expires_at)
            .await?;

        counter!(
            "sponsor_refresh_total",
            "result" => if sponsoring { "sponsoring" } else { "not_sponsoring" }
        )
        .increment(1);
        info!(
            principal_id = %principal.id,
            target = %self.target_account,
            sponsoring,
            "Refreshed sponsor status"
        );

        Ok(SponsorshipRecord::at(updated.sponsor_expires_at, now))
    }

    /// GitHub organization ids the principal belongs to; empty without a token.
    pub async fn organization_ids(&self, principal: &principal::Model) -> Vec<String> {
        match principal.github_access_token.as_deref() {
            Some(token) if !token.is_empty() => self.client.organization_ids(token).await,
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_expiry_is_inactive() {
        assert!(!is_active_at(None, Utc::now()));
    }

    #[test]
    fn expiry_equal_to_now_is_inactive() {
        let now = Utc::now();
        assert!(!is_active_at(Some(now), now));
    }

    #[test]
    fn past_expiry_is_inactive() {
        let now = Utc::now();
        assert!(!is_active_at(Some(now - Duration::seconds(1)), now));
    }

    #[test]
    fn future_expiry_is_active() {
        let now = Utc::now();
        assert!(is_active_at(Some(now + Duration::weeks(2)), now));
        assert!(is_active_at(Some(now + Duration::nanoseconds(1)), now));
    }

    #[test]
    fn record_reflects_boundary() {
        let now = Utc::now();
        let record = SponsorshipRecord::at(Some(now), now);
        assert!(!record.active);
        assert_eq!(record.expires_at, Some(now));
    }
}
