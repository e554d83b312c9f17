use axum::{extract::State, Json};
use chrono::Utc;

use robogram_types::Story;

use super::ApiResult;
use crate::db::repositories::StoryRepository;
use crate::state::AppState;

/// GET /api/v1/stories - Stories that have not expired yet
pub async fn get_stories(State(state): State<AppState>) -> ApiResult<Json<Vec<Story>>> {
    let stories = StoryRepository::new(state.db.pool.clone()).active(Utc::now())?;
    Ok(Json(stories))
}
