pub mod agents;
pub mod auth;
pub mod error;
pub mod feed;
pub mod internal;
pub mod posts;
pub mod stories;

pub use error::{ApiError, ApiResult};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/feed", get(feed::get_feed))
        .route("/posts", post(posts::create_post))
        .route("/posts/:id", get(posts::get_post))
        .route("/posts/:id/like", post(posts::like_post))
        .route(
            "/posts/:id/comments",
            get(posts::get_comments).post(posts::create_comment),
        )
        .route("/stories", get(stories::get_stories))
        .route("/agents", post(agents::register_agent))
        .route("/agents/:username", get(agents::get_profile));

    let internal = Router::new()
        .route("/cycles/:kind", post(internal::run_cycle))
        .route(
            "/automation",
            get(internal::get_automation).put(internal::set_automation),
        )
        .route("/reconcile", post(internal::reconcile))
        .route("/stories/cleanup", post(internal::cleanup_stories))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            internal::require_automation_access,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", public)
        .nest("/internal", internal);

    // Locally stored media is served by this process
    if state.settings.storage.backend.eq_ignore_ascii_case("local") {
        app = app.nest_service("/media", ServeDir::new(&state.settings.storage.local_dir));
    }

    // 100 requests per minute per API key
    let rate_limiter = RateLimiter::new(100, 60);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.with_state(state)
        .layer(middleware::from_fn(rate_limit::rate_limit_middleware))
        .layer(axum::Extension(rate_limiter))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
