/// HTTP surface tests driven through the router without a socket
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use courtline::{config::ServerConfig, db, server::build_router, AppContext};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app_with(cron_token: Option<&str>) -> (AppContext, Router) {
    let pool = db::create_memory_pool().await.unwrap();
    let mut config = ServerConfig::for_database("api.sqlite".into());
    config.service.cron_token = cron_token.map(str::to_string);

    let ctx = AppContext::with_pool(config, pool).unwrap();
    sqlx::query(
        "INSERT INTO tournaments (id, name, max_participants, current_participants) VALUES ('full', 'Summer Slam', 2, 2), ('open', 'Rec Night', 10, 3)",
    )
    .execute(&ctx.db)
    .await
    .unwrap();

    let router = build_router(ctx.clone());
    (ctx, router)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn join_full_event_returns_position() {
    let (_ctx, router) = app_with(None).await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/waitlist/join",
        Some(json!({ "userId": "u1", "eventKind": "tournament", "eventId": "full" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 1);
    assert!(body["entryId"].is_string());
}

#[tokio::test]
async fn join_event_with_room_is_rejected() {
    let (_ctx, router) = app_with(None).await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/waitlist/join",
        Some(json!({ "userId": "u1", "eventKind": "tournament", "eventId": "open" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRequest");
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let (_ctx, router) = app_with(None).await;

    let (status, _) = send(
        &router,
        Method::GET,
        "/api/waitlist/capacity?eventKind=league&eventId=nope",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_lifecycle_over_http() {
    let (_ctx, router) = app_with(None).await;

    for user in ["u1", "u2"] {
        send(
            &router,
            Method::POST,
            "/api/waitlist/join",
            Some(json!({ "userId": user, "eventKind": "tournament", "eventId": "full" })),
        )
        .await;
    }

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/waitlist/promote",
        Some(json!({ "eventKind": "tournament", "eventId": "full" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["promotion"]["userId"], "u1");

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/waitlist/position?userId=u1&eventKind=tournament&eventId=full",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "spot_offered");
    assert!(body["spotExpiresAt"].is_string());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/waitlist/accept",
        Some(json!({ "userId": "u1", "eventKind": "tournament", "eventId": "full" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Spot accepted successfully" }));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/waitlist/decline",
        Some(json!({ "userId": "u1", "eventKind": "tournament", "eventId": "full" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No spot offer found");

    let (_, body) = send(
        &router,
        Method::GET,
        "/api/waitlist/entries?eventKind=tournament&eventId=full",
        None,
    )
    .await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["user"]["id"], "u2");
    assert_eq!(entries[0]["position"], 1);

    let (_, body) = send(
        &router,
        Method::GET,
        "/api/waitlist/capacity?eventKind=tournament&eventId=full",
        None,
    )
    .await;
    assert_eq!(body["currentCount"], 3);

    let (_, body) = send(&router, Method::GET, "/api/notifications?userId=u1", None).await;
    assert_eq!(body["notifications"][0]["type"], "spot_accepted");
}

#[tokio::test]
async fn leave_reports_missing_entry() {
    let (_ctx, router) = app_with(None).await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/waitlist/leave",
        Some(json!({ "userId": "ghost", "eventKind": "tournament", "eventId": "full" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You are not on the waitlist");
}

#[tokio::test]
async fn sweep_requires_cron_token_when_configured() {
    let (_ctx, router) = app_with(Some("s3cret")).await;

    let (status, _) = send(&router, Method::POST, "/api/waitlist/sweep", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/waitlist/sweep")
                .header(header::AUTHORIZATION, "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["expired"], 0);
}

#[tokio::test]
async fn health_and_metrics_are_served() {
    let (_ctx, router) = app_with(None).await;

    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = send(&router, Method::GET, "/no/such/route", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}
