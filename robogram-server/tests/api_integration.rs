// End-to-end checks of the HTTP surface against an in-memory database.
// Requests go straight into the router with tower's `oneshot`, no socket needed.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use robogram_server::{
    api,
    assets::{storage::LocalObjectStore, AssetMaterializer},
    config::Settings,
    db::Database,
    generation::ContentGenerator,
    state::AppState,
    webhook::WebhookNotifier,
};

const CRON_SECRET: &str = "test-cron-secret";

fn test_app() -> Router {
    let db = Database::in_memory().expect("Failed to create test database");
    db.initialize().expect("Failed to initialize schema");
    db.seed_personas().expect("Failed to seed personas");

    let mut settings = Settings::new().expect("Failed to load settings");
    settings.automation.cron_secret = Some(CRON_SECRET.to_string());
    settings.automation.allowed_origins = vec!["https://robogram.test".to_string()];
    settings.automation.enabled_by_default = true;

    let media_dir = std::env::temp_dir().join(format!("robogram-api-{}", uuid::Uuid::new_v4()));
    let store = LocalObjectStore::new(media_dir, &settings.server.public_url);
    let materializer = AssetMaterializer::new(reqwest::Client::new(), Arc::new(store));

    let state = AppState::new(
        db,
        settings,
        ContentGenerator::offline(),
        materializer,
        WebhookNotifier::new(reqwest::Client::new()),
    );
    api::router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    builder.body(Body::empty()).unwrap()
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/v1/agents",
            None,
            json!({ "username": username, "display_name": "Integration Bot" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body["api_key"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, key: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/v1/posts",
            Some(key),
            json!({ "caption": "sunset over the harbor", "image_url": "https://cdn.test/sunset.png" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "post failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_registration_rules() {
    let app = test_app();
    register(&app, "first_bot").await;

    // Taken, including by a seeded persona
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/agents",
            None,
            json!({ "username": "first_bot", "display_name": "Again" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/agents",
            None,
            json!({ "username": "luna_lens", "display_name": "Imposter" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/agents",
            None,
            json!({ "username": "Bad Name!", "display_name": "Nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_requires_valid_key() {
    let app = test_app();
    let body = json!({ "caption": "hi", "image_url": "https://cdn.test/a.png" });

    let (status, _) = send(&app, json_request("POST", "/api/v1/posts", None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, json_request("POST", "/api/v1/posts", Some("rg_bogus"), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_needs_exactly_one_image_source() {
    let app = test_app();
    let key = register(&app, "image_bot").await;

    let (status, _) = send(
        &app,
        json_request("POST", "/api/v1/posts", Some(&key), json!({ "caption": "no image" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/posts",
            Some(&key),
            json!({ "image_url": "https://cdn.test/a.png", "generate_image": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/posts",
            Some(&key),
            json!({ "image_url": "file:///etc/passwd" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generated_image_without_provider_or_avatar() {
    let app = test_app();
    let key = register(&app, "no_avatar_bot").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/posts",
            Some(&key),
            json!({ "caption": "paint me something", "generate_image": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["details"].as_str().unwrap().contains("avatar"));

    let (status, body) = send(&app, get("/api/v1/feed", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.to_string().contains("paint me something"));
}

#[tokio::test]
async fn test_missing_caption_is_generated() {
    let app = test_app();
    let key = register(&app, "quiet_bot").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/posts",
            Some(&key),
            json!({ "image_url": "https://cdn.test/quiet.png" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!body["caption"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_like_flow() {
    let app = test_app();
    let author = register(&app, "author_bot").await;
    let fan = register(&app, "fan_bot").await;
    let post_id = create_post(&app, &author).await;
    let like_uri = format!("/api/v1/posts/{}/like", post_id);

    let (status, body) = send(&app, json_request("POST", &like_uri, Some(&fan), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 1);

    // Second like from the same agent
    let (status, _) = send(&app, json_request("POST", &like_uri, Some(&fan), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Own post
    let (status, _) = send(&app, json_request("POST", &like_uri, Some(&author), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get(&format!("/api/v1/posts/{}", post_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 1);

    let missing = format!("/api/v1/posts/{}/like", uuid::Uuid::new_v4());
    let (status, _) = send(&app, json_request("POST", &missing, Some(&fan), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, json_request("POST", "/api/v1/posts/not-a-uuid/like", Some(&fan), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comment_flow() {
    let app = test_app();
    let author = register(&app, "chatty_author").await;
    let fan = register(&app, "chatty_fan").await;
    let post_id = create_post(&app, &author).await;
    let uri = format!("/api/v1/posts/{}/comments", post_id);

    let (status, _) = send(&app, json_request("POST", &uri, Some(&fan), json!({ "content": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("POST", &uri, Some(&fan), json!({ "content": "x".repeat(501) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for text in ["first!", "love the colors"] {
        let (status, _) = send(&app, json_request("POST", &uri, Some(&fan), json!({ "content": text }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    let comments = body.as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "first!");

    let (_, post) = send(&app, get(&format!("/api/v1/posts/{}", post_id), None)).await;
    assert_eq!(post["comment_count"], 2);
}

#[tokio::test]
async fn test_feed_pagination_and_mine() {
    let app = test_app();
    let me = register(&app, "feed_me").await;
    let other = register(&app, "feed_other").await;
    for _ in 0..3 {
        create_post(&app, &me).await;
    }
    create_post(&app, &other).await;

    let (status, body) = send(&app, get("/api/v1/feed?limit=2", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_more"], true);

    let (status, body) = send(&app, get("/api/v1/feed?limit=2&offset=2", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_more"], false);

    let (status, _) = send(&app, get("/api/v1/feed?mine=true", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/api/v1/feed?mine=true", Some(&me))).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 3);
    assert!(posts.iter().all(|p| p["agent_username"] == "feed_me"));
}

#[tokio::test]
async fn test_profiles_and_stories() {
    let app = test_app();

    let (status, body) = send(&app, get("/api/v1/agents/luna_lens", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "luna_lens");
    assert!(body.get("api_key").is_none());

    let (status, _) = send(&app, get("/api/v1/agents/nobody_here", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/v1/stories", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_internal_routes_are_guarded() {
    let app = test_app();

    let (status, _) = send(&app, get("/internal/automation", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/internal/automation")
        .header("X-Cron-Secret", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get(&format!("/internal/automation?secret={}", CRON_SECRET), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);

    let request = Request::builder()
        .uri("/internal/automation")
        .header(header::ORIGIN, "https://robogram.test")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

fn internal(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Cron-Secret", CRON_SECRET)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_cycles_and_automation_switch() {
    let app = test_app();

    let (status, _) = send(&app, internal("POST", "/internal/cycles/dancing", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, internal("POST", "/internal/cycles/posts?count=21", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, internal("POST", "/internal/cycles/community?count=1", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["performed"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, internal("PUT", "/internal/automation", json!({ "enabled": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);

    let (status, _) = send(&app, internal("POST", "/internal/cycles/community", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, internal("GET", "/internal/automation", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
}

#[tokio::test]
async fn test_reconcile_and_cleanup() {
    let app = test_app();

    let (status, body) = send(&app, internal("POST", "/internal/reconcile", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents_updated"], 0);
    assert_eq!(body["posts_updated"], 0);

    let (status, body) = send(&app, internal("POST", "/internal/stories/cleanup", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}
