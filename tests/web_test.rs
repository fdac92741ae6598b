//! Integration tests for the web layer: webhook signature enforcement,
//! admin gating on suppression management, and scheduler triggers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use roofline_core::auth::Identity;
use roofline_core::config::{CoreConfig, EmailMode};
use roofline_core::constants::SUPPRESSIONS_COLLECTION;
use roofline_core::ingestion::sign_body;
use roofline_core::store::MemoryStore;
use roofline_core::test_utils::{MockMailProvider, StaticIdentityResolver};
use roofline_core::web::{build_router, AppState};

const SECRET: &str = "shared-secret";

fn app() -> (Router, Arc<MemoryStore>) {
    let mut config = CoreConfig::default();
    config.email.mode = EmailMode::Live;
    config.webhook.signing_secret = Some(SECRET.to_string());

    let store = Arc::new(MemoryStore::new());
    let resolver = StaticIdentityResolver::new()
        .with_token("admin-token", Identity::new("admin-1", 3))
        .with_token("inspector-token", Identity::new("inspector-1", 1));

    let state = AppState::new(
        store.clone(),
        Arc::new(MockMailProvider::new()),
        Arc::new(resolver),
        Arc::new(config),
    );
    (build_router(state), store)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/v1/webhooks/email")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-webhook-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let (router, _) = app();
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_rejects_missing_and_invalid_signatures() {
    let (router, store) = app();
    let body = json!({"events": [
        {"event_id": "evt-1", "type": "bounce", "email": "a@x.com", "bounce_type": "hard"}
    ]})
    .to_string();

    let response = router
        .clone()
        .oneshot(webhook_request(&body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(webhook_request(&body, Some("deadbeef")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.len(SUPPRESSIONS_COLLECTION), 0);
}

#[tokio::test]
async fn webhook_rejects_malformed_json() {
    let (router, _) = app();
    let body = "{not json";
    let response = router
        .oneshot(webhook_request(body, Some(&sign_body(SECRET, body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_processes_a_signed_batch_best_effort() {
    let (router, store) = app();
    let body = json!({"events": [
        {"event_id": "evt-1", "type": "bounce", "email": "a@x.com", "bounce_type": "hard"},
        {"event_id": "evt-1", "type": "bounce", "email": "a@x.com", "bounce_type": "hard"},
        {"event_id": "evt-2", "type": "mystery", "email": "b@x.com"}
    ]})
    .to_string();

    let response = router
        .oneshot(webhook_request(&body, Some(&sign_body(SECRET, body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let summary = read_json(response).await;
    assert_eq!(summary["received"], json!(3));
    assert_eq!(summary["processed"], json!(2));
    assert_eq!(summary["duplicates"], json!(1));
    assert_eq!(summary["errors"], json!(0));
    assert_eq!(store.len(SUPPRESSIONS_COLLECTION), 1);
}

#[tokio::test]
async fn suppression_management_requires_an_admin() {
    let (router, _) = app();
    let body = json!({"address": "bad@example.com"}).to_string();

    let request = |token: Option<&str>| {
        let mut builder = Request::post("/v1/suppressions")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.clone())).unwrap()
    };

    let response = router.clone().oneshot(request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(request(Some("inspector-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router.oneshot(request(Some("admin-token"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = read_json(response).await;
    assert_eq!(created["address"], json!("bad@example.com"));
    assert_eq!(created["suppressed"], json!(true));
}

#[tokio::test]
async fn suppression_lifecycle_over_http() {
    let (router, store) = app();

    let create = Request::post("/v1/suppressions")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .body(Body::from(
            json!({"address": "Bad@Example.com", "reason": "manual"}).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.len(SUPPRESSIONS_COLLECTION), 1);

    let list = Request::get("/v1/suppressions")
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(list).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json(response).await;
    assert_eq!(listed["suppressions"].as_array().unwrap().len(), 1);
    assert_eq!(
        listed["suppressions"][0]["address"],
        json!("bad@example.com")
    );

    let remove = Request::delete("/v1/suppressions/bad@example.com")
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(remove).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.len(SUPPRESSIONS_COLLECTION), 0);

    let remove_again = Request::delete("/v1/suppressions/bad@example.com")
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(remove_again).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scheduler_triggers_are_admin_gated() {
    let (router, _) = app();

    let trigger = |path: &str, token: Option<&str>| {
        let mut builder = Request::post(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    };

    let response = router
        .clone()
        .oneshot(trigger("/v1/jobs/retry-sweep", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(trigger("/v1/jobs/retry-sweep", Some("admin-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = read_json(response).await;
    assert_eq!(outcome["scanned"], json!(0));

    let response = router
        .oneshot(trigger("/v1/jobs/escalation-sweep", Some("admin-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = read_json(response).await;
    assert_eq!(outcome["scanned"], json!(0));
}
