//! GitHub GraphQL client for sponsorship lookups
//!
//! Every call is authenticated with the caller's own token, so answers are
//! always about that token's owner.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::connectors::trait_::{ProviderError, SponsorshipClient};

const PROVIDER: &str = "github";

const USER_AGENT: &str = concat!("docsite/", env!("CARGO_PKG_VERSION"));

const SPONSORSHIP_QUERY: &str = r#"
query($account: String!) {
  user(login: $account) {
    viewerIsSponsoring
  }
  organization(login: $account) {
    viewerIsSponsoring
  }
}
"#;

const ORGANIZATIONS_QUERY: &str = r#"
query {
  viewer {
    organizations(first: 100) {
      nodes {
        databaseId
      }
    }
  }
}
"#;

/// GitHub GraphQL implementation of [`SponsorshipClient`].
#[derive(Debug, Clone)]
pub struct GitHubSponsorshipClient {
    http: reqwest::Client,
    graphql_url: String,
}

impl GitHubSponsorshipClient {
    /// Create a client for `api_base` (e.g. `https://api.github.com`).
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Configuration {
                details: format!("failed to build GitHub HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            graphql_url: format!("{}/graphql", api_base.trim_end_matches('/')),
        })
    }

    /// Runs a GraphQL query and returns the decoded body.
    async fn query(&self, token: &str, body: Value) -> Result<Value, ProviderError> {
        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(&body)
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

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER,
                details: e.to_string(),
            })
    }
}

#[async_trait]
impl SponsorshipClient for GitHubSponsorshipClient {
    async fn is_sponsoring(&self, account: &str, token: &str) -> bool {
        let body = json!({
            "query": SPONSORSHIP_QUERY,
            "variables": { "account": account },
        });

        match self.query(token, body).await {
            Ok(response) => {
                let sponsoring = sponsorship_flag(&response);
                debug!(account, sponsoring, "Resolved GitHub sponsorship");
                sponsoring
            }
            Err(e) => {
                warn!(account, error = %e, "GitHub sponsorship lookup failed");
                false
            }
        }
    }

    async fn organization_ids(&self, token: &str) -> Vec<String> {
        let body = json!({ "query": ORGANIZATIONS_QUERY });

        match self.query(token, body).await {
            Ok(response) => organization_ids_from(&response),
            Err(e) => {
                warn!(error = %e, "GitHub organization lookup failed");
                Vec::new()
            }
        }
    }
}

/// True if either the user or the organization resolution reports sponsorship.
fn sponsorship_flag(response: &Value) -> bool {
    let flag = |pointer: &str| {
        response
            .pointer(pointer)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };

    flag("/data/user/viewerIsSponsoring") || flag("/data/organization/viewerIsSponsoring")
}

/// Organization database ids as strings; malformed nodes are skipped.
fn organization_ids_from(response: &Value) -> Vec<String> {
    response
        .pointer("/data/viewer/organizations/nodes")
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|node| match node.get("databaseId") {
                    Some(Value::Number(n)) => Some(n.to_string()),
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_flag_alone_is_enough() {
        let response = json!({"data": {"user": {"viewerIsSponsoring": true}}});
        assert!(sponsorship_flag(&response));
    }

    #[test]
    fn organization_flag_alone_is_enough() {
        let response = json!({
            "data": {
                "user": null,
                "organization": {"viewerIsSponsoring": true}
            }
        });
        assert!(sponsorship_flag(&response));
    }

    #[test]
    fn missing_or_malformed_fields_default_closed() {
        for response in [
            json!({}),
            json!({"data": null}),
            json!({"data": {"user": {"viewerIsSponsoring": "yes"}}}),
            json!({"errors": [{"type": "NOT_FOUND"}]}),
            json!({"data": {"user": {"viewerIsSponsoring": false}, "organization": null}}),
        ] {
            assert!(!sponsorship_flag(&response), "{response}");
        }
    }

    #[test]
    fn organization_ids_are_stringified() {
        let response = json!({
            "data": {"viewer": {"organizations": {"nodes": [
                {"databaseId": 958072},
                {"databaseId": null},
                {"databaseId": 47703742}
            ]}}}
        });
        assert_eq!(organization_ids_from(&response), vec!["958072", "47703742"]);
    }

    #[test]
    fn organization_ids_empty_on_missing_data() {
        assert!(organization_ids_from(&json!({"data": {"viewer": null}})).is_empty());
    }

    #[test]
    fn graphql_url_is_derived_from_base() {
        let client =
            GitHubSponsorshipClient::new("https://api.github.com/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.graphql_url, "https://api.github.com/graphql");
    }
}
