use std::time::Duration;

use docsite::connectors::{GitHubSponsorshipClient, SponsorshipClient};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn client(server: &MockServer) -> GitHubSponsorshipClient {
    GitHubSponsorshipClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_user_sponsorship_is_detected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer gho_sponsor_token"))
        .and(body_partial_json(json!({"variables": {"account": "inertiajs"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": {"viewerIsSponsoring": true},
                "organization": null
            },
            "errors": [{
                "type": "NOT_FOUND",
                "path": ["organization"],
                "message": "Could not resolve to an Organization with the login of 'inertiajs'."
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert!(
        client(&mock_server)
            .is_sponsoring("inertiajs", "gho_sponsor_token")
            .await
    );
}

#[tokio::test]
async fn test_organization_sponsorship_is_detected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": null,
                "organization": {"viewerIsSponsoring": true}
            }
        })))
        .mount(&mock_server)
        .await;

    assert!(client(&mock_server).is_sponsoring("inertiajs", "token").await);
}

#[tokio::test]
async fn test_non_sponsor_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": {"viewerIsSponsoring": false},
                "organization": null
            }
        })))
        .mount(&mock_server)
        .await;

    assert!(!client(&mock_server).is_sponsoring("inertiajs", "token").await);
}

#[tokio::test]
async fn test_failures_default_to_not_sponsoring() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Bad credentials"
        })))
        .mount(&mock_server)
        .await;

    assert!(!client(&mock_server).is_sponsoring("inertiajs", "revoked").await);
    assert!(client(&mock_server).organization_ids("revoked").await.is_empty());
}

#[tokio::test]
async fn test_malformed_body_defaults_to_not_sponsoring() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    assert!(!client(&mock_server).is_sponsoring("inertiajs", "token").await);
}

#[tokio::test]
async fn test_unreachable_api_defaults_to_not_sponsoring() {
    let client = GitHubSponsorshipClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

    assert!(!client.is_sponsoring("inertiajs", "token").await);
}

#[tokio::test]
async fn test_organization_ids_are_returned_as_strings() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer member_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"viewer": {"organizations": {"nodes": [
                {"databaseId": 958072},
                {"databaseId": 47703742}
            ]}}}
        })))
        .mount(&mock_server)
        .await;

    let ids = client(&mock_server).organization_ids("member_token").await;
    assert_eq!(ids, vec!["958072".to_string(), "47703742".to_string()]);
}

#[tokio::test]
async fn test_no_organizations_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"viewer": {"organizations": {"nodes": []}}}
        })))
        .mount(&mock_server)
        .await;

    assert!(client(&mock_server).organization_ids("token").await.is_empty());
}
