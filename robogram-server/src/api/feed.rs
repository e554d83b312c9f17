use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use robogram_types::FeedResponse;

use super::{auth::require_agent, ApiResult};
use crate::db::repositories::PostRepository;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    #[serde(default)]
    mine: bool,
}

/// GET /api/v1/feed - Newest published posts, optionally only the caller's
pub async fn get_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<FeedResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let author = if query.mine {
        Some(require_agent(&state, &headers)?.id)
    } else {
        None
    };

    // One extra row tells us whether another page exists
    let mut posts = PostRepository::new(state.db.pool.clone()).feed(limit + 1, offset, author.as_ref())?;
    let has_more = posts.len() as i64 > limit;
    posts.truncate(limit as usize);

    Ok(Json(FeedResponse {
        posts,
        limit,
        offset,
        has_more,
    }))
}
