//! Sponsor status endpoints and evaluator behaviour against the database.

mod test_utils;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use docsite::sponsor_status::SponsorStatusEvaluator;
use tower::ServiceExt;

use test_utils::{
    StubDiscord, StubSponsorship, TestApp, get, json_body, session_cookie, test_config,
};

async fn app_answering(sponsoring: bool) -> TestApp {
    TestApp::build(
        test_config(None),
        StubDiscord::new(),
        StubSponsorship::answering(sponsoring),
    )
    .await
    .unwrap()
}

fn refresh_request(principal_id: uuid::Uuid) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/sponsors/refresh")
        .header(header::COOKIE, session_cookie(principal_id))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn status_requires_a_session() {
    let app = app_answering(true).await;

    let response = app.router.clone().oneshot(get("/sponsors/status", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn status_reads_the_cache_without_network() {
    let app = app_answering(true).await;
    let principal = app.create_principal(Some("gho_token")).await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get("/sponsors/status", Some(principal.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["active"], false);
    assert!(body["expires_at"].is_null());
    assert_eq!(app.sponsorship.call_count(), 0);
}

#[tokio::test]
async fn refresh_forward_dates_the_expiry_for_sponsors() {
    let app = app_answering(true).await;
    let principal = app.create_principal(Some("gho_token")).await.unwrap();
    let before = Utc::now();

    let response = app.router.clone().oneshot(refresh_request(principal.id)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["active"], true);
    assert!(body["expires_at"].is_string());
    assert_eq!(app.sponsorship.call_count(), 1);

    let stored = app.principals().find_by_id(principal.id).await.unwrap().unwrap();
    let expires_at = stored.sponsor_expires_at.unwrap();
    assert!(expires_at >= before + Duration::days(30));
    assert!(expires_at <= Utc::now() + Duration::days(30));

    let response = app
        .router
        .clone()
        .oneshot(get("/sponsors/status", Some(principal.id)))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["active"], true);
}

#[tokio::test]
async fn refresh_clears_the_expiry_for_lapsed_sponsors() {
    let app = app_answering(false).await;
    let principal = app.create_principal(Some("gho_token")).await.unwrap();
    app.principals()
        .set_sponsor_expiry(principal.id, Some(Utc::now() + Duration::days(10)))
        .await
        .unwrap();

    let response = app.router.clone().oneshot(refresh_request(principal.id)).await.unwrap();

    let body = json_body(response).await;
    assert_eq!(body["active"], false);
    assert!(body["expires_at"].is_null());

    let stored = app.principals().find_by_id(principal.id).await.unwrap().unwrap();
    assert!(stored.sponsor_expires_at.is_none());
}

#[tokio::test]
async fn refresh_without_token_skips_the_network() {
    let app = app_answering(true).await;
    let principal = app.create_principal(None).await.unwrap();
    app.principals()
        .set_sponsor_expiry(principal.id, Some(Utc::now() + Duration::days(10)))
        .await
        .unwrap();

    let response = app.router.clone().oneshot(refresh_request(principal.id)).await.unwrap();

    assert_eq!(json_body(response).await["active"], false);
    assert_eq!(app.sponsorship.call_count(), 0);
}

#[tokio::test]
async fn evaluator_honours_the_expiry_boundary() {
    let app = app_answering(true).await;
    let principal = app.create_principal(Some("gho_token")).await.unwrap();
    let evaluator = SponsorStatusEvaluator::new(
        app.sponsorship.clone(),
        app.principals(),
        "inertiajs",
        7,
    );

    let now = Utc::now();
    let expiring = app
        .principals()
        .set_sponsor_expiry(principal.id, Some(now))
        .await
        .unwrap();

    let boundary = expiring.sponsor_expires_at.unwrap();

    assert!(!evaluator.has_active_sponsor_at(&expiring, boundary));
    assert!(evaluator.has_active_sponsor_at(&expiring, boundary - Duration::seconds(1)));
    assert!(!evaluator.has_active_sponsor(&expiring));
}

#[tokio::test]
async fn evaluator_uses_configured_expiry_window() {
    let app = app_answering(true).await;
    let principal = app.create_principal(Some("gho_token")).await.unwrap();
    let evaluator = SponsorStatusEvaluator::new(
        app.sponsorship.clone(),
        app.principals(),
        "inertiajs",
        7,
    );

    let record = evaluator.refresh(&principal).await.unwrap();

    assert!(record.active);
    let expires_at = record.expires_at.unwrap();
    assert!(expires_at <= Utc::now() + Duration::days(7));
    assert!(expires_at > Utc::now() + Duration::days(6));
}

#[tokio::test]
async fn organization_ids_need_a_token() {
    let app = TestApp::build(
        test_config(None),
        StubDiscord::new(),
        StubSponsorship {
            organizations: vec!["958072".to_string()],
            ..StubSponsorship::default()
        },
    )
    .await
    .unwrap();
    let evaluator = SponsorStatusEvaluator::new(
        app.sponsorship.clone(),
        app.principals(),
        "inertiajs",
        30,
    );

    let with_token = app.create_principal(Some("gho_token")).await.unwrap();
    let without_token = app.create_principal(None).await.unwrap();

    assert_eq!(evaluator.organization_ids(&with_token).await, vec!["958072"]);
    assert!(evaluator.organization_ids(&without_token).await.is_empty());
    assert_eq!(app.sponsorship.call_count(), 1);
}
