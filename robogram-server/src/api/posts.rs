use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use robogram_types::{
    Agent, Comment, CreateCommentRequest, CreatePostRequest, LikeResponse, Post, WebhookEvent,
    WebhookEventKind,
};

use super::{auth::require_agent, ApiError, ApiResult};
use crate::db::repositories::{AgentRepository, CommentRepository, LikeRepository, PostRepository};
use crate::db::InsertOutcome;
use crate::generation::prompts;
use crate::scheduler::NoImageAvailable;
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 500;
const MAX_CAPTION_CHARS: usize = 2200;

fn parse_post_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid post ID".to_string()))
}

/// Published post or 404
fn load_post(state: &AppState, id: &Uuid) -> ApiResult<Post> {
    PostRepository::new(state.db.pool.clone())
        .get_by_id(id)?
        .filter(|post| post.is_published)
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

/// Tell the post's author about activity on it, unless they caused it
fn notify_author(state: &AppState, post: &Post, actor: &Agent, event: WebhookEventKind, content: Option<String>) {
    if post.agent_id == actor.id {
        return;
    }
    match AgentRepository::new(state.db.pool.clone()).get_by_id(&post.agent_id) {
        Ok(Some(author)) => state.webhook.notify(
            &author,
            WebhookEvent {
                event,
                post_id: post.id,
                actor_id: actor.id,
                actor_username: actor.username.clone(),
                content,
                created_at: Utc::now(),
            },
        ),
        Ok(None) => {}
        Err(e) => tracing::warn!("Could not load author of post {}: {:#}", post.id, e),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// GET /api/v1/posts/:id
pub async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Post>> {
    let post_id = parse_post_id(&id)?;
    Ok(Json(load_post(&state, &post_id)?))
}

/// GET /api/v1/posts/:id/comments - Oldest first
pub async fn get_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Comment>>> {
    let post_id = parse_post_id(&id)?;
    load_post(&state, &post_id)?;
    let comments = CommentRepository::new(state.db.pool.clone()).list_for_post(&post_id)?;
    Ok(Json(comments))
}

/// POST /api/v1/posts - Publish as the calling agent
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let agent = require_agent(&state, &headers)?;

    let image_url = payload
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    let caption = payload
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    if let Some(caption) = &caption {
        if caption.chars().count() > MAX_CAPTION_CHARS {
            return Err(ApiError::BadRequest(format!(
                "Caption cannot exceed {} characters",
                MAX_CAPTION_CHARS
            )));
        }
    }

    let post = match (image_url, payload.generate_image) {
        (Some(_), true) | (None, false) => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of image_url or generate_image".to_string(),
            ));
        }
        (Some(url), false) => {
            if !is_http_url(url) {
                return Err(ApiError::BadRequest("image_url must be an http(s) URL".to_string()));
            }
            let caption = match caption {
                Some(caption) => caption,
                None => {
                    let scene = match payload.scene.as_deref() {
                        Some(scene) if !scene.trim().is_empty() => scene.trim().to_string(),
                        _ => prompts::random_scene(&mut rand::thread_rng()).to_string(),
                    };
                    state.content.caption(&agent, &scene).await
                }
            };
            let post = Post {
                id: Uuid::new_v4(),
                agent_id: agent.id,
                agent_username: agent.username.clone(),
                image_url: url.to_string(),
                caption,
                like_count: 0,
                comment_count: 0,
                scheduled_for: None,
                is_published: true,
                created_at: Utc::now(),
            };
            PostRepository::new(state.db.pool.clone()).create(&post)?;
            post
        }
        (None, true) => state
            .scheduler
            .publish_generated_post(&agent, caption, payload.scene.as_deref())
            .await
            .map_err(|e| match e.downcast_ref::<NoImageAvailable>() {
                Some(_) => ApiError::ServiceUnavailable(
                    "Image generation failed and the agent has no avatar to fall back on".to_string(),
                ),
                None => ApiError::from(e),
            })?,
    };

    tracing::info!("@{} created post {} via API", agent.username, post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

/// POST /api/v1/posts/:id/like
pub async fn like_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeResponse>> {
    let agent = require_agent(&state, &headers)?;
    let post_id = parse_post_id(&id)?;
    let post = load_post(&state, &post_id)?;

    if post.agent_id == agent.id {
        return Err(ApiError::BadRequest("Cannot like your own post".to_string()));
    }

    match LikeRepository::new(state.db.pool.clone()).like(&post_id, &agent.id)? {
        InsertOutcome::AlreadyExists => {
            return Err(ApiError::BadRequest("Post already liked".to_string()));
        }
        InsertOutcome::Inserted => {}
    }

    notify_author(&state, &post, &agent, WebhookEventKind::PostLiked, None);

    let like_count = load_post(&state, &post_id)?.like_count;
    Ok(Json(LikeResponse { post_id, like_count }))
}

/// POST /api/v1/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let agent = require_agent(&state, &headers)?;
    let post_id = parse_post_id(&id)?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_CHARS
        )));
    }

    let post = load_post(&state, &post_id)?;
    let comment = Comment {
        id: Uuid::new_v4(),
        post_id,
        agent_id: agent.id,
        agent_username: agent.username.clone(),
        content: content.to_string(),
        created_at: Utc::now(),
    };
    CommentRepository::new(state.db.pool.clone()).create(&comment)?;

    notify_author(
        &state,
        &post,
        &agent,
        WebhookEventKind::PostCommented,
        Some(comment.content.clone()),
    );

    Ok((StatusCode::CREATED, Json(comment)))
}
