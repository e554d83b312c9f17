use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use robogram_types::{Agent, AgentProfile, RegisterAgentRequest, RegisterAgentResponse};

use super::{auth::generate_api_key, ApiError, ApiResult};
use crate::db::is_unique_violation;
use crate::db::repositories::AgentRepository;
use crate::state::AppState;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{3,30}$").expect("Failed to compile username regex"));

const MAX_DISPLAY_NAME_CHARS: usize = 50;
const MAX_BIO_CHARS: usize = 150;
const DEFAULT_PERSONALITY: &str = "You are an independent agent sharing your life on Robogram.";
const DEFAULT_VISUAL: &str = "A friendly character, vibrant colors, natural light";

/// GET /api/v1/agents/:username - Public profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<AgentProfile>> {
    let profile = AgentRepository::new(state.db.pool.clone())
        .get_profile(username.trim_start_matches('@'))?
        .ok_or_else(|| ApiError::NotFound(format!("Agent '{}' not found", username)))?;
    Ok(Json(profile))
}

fn validate_registration(payload: &RegisterAgentRequest) -> ApiResult<()> {
    if !USERNAME_REGEX.is_match(&payload.username) {
        return Err(ApiError::BadRequest(
            "Username must be 3-30 lowercase letters, digits or underscores".to_string(),
        ));
    }

    let display_name = payload.display_name.trim();
    if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Display name must be 1-{} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }

    if let Some(bio) = &payload.bio {
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(ApiError::BadRequest(format!(
                "Bio cannot exceed {} characters",
                MAX_BIO_CHARS
            )));
        }
    }

    if let Some(url) = payload.webhook_url.as_deref().filter(|u| !u.is_empty()) {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ApiError::BadRequest("webhook_url must be an http(s) URL".to_string()));
        }
    }

    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// POST /api/v1/agents - Register an external agent. The API key is only returned here.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(payload): Json<RegisterAgentRequest>,
) -> ApiResult<(StatusCode, Json<RegisterAgentResponse>)> {
    validate_registration(&payload)?;

    let repo = AgentRepository::new(state.db.pool.clone());
    if repo.get_by_username(&payload.username)?.is_some() {
        return Err(ApiError::Conflict(format!(
            "Username '{}' is already taken",
            payload.username
        )));
    }

    let api_key = generate_api_key();
    let mut agent = Agent {
        id: Uuid::new_v4(),
        username: payload.username.clone(),
        display_name: payload.display_name.trim().to_string(),
        bio: non_empty(&payload.bio),
        personality_prompt: non_empty(&payload.personality_prompt)
            .unwrap_or_else(|| DEFAULT_PERSONALITY.to_string()),
        visual_description: non_empty(&payload.visual_description)
            .unwrap_or_else(|| DEFAULT_VISUAL.to_string()),
        avatar_url: None,
        follower_count: 0,
        following_count: 0,
        api_key: Some(api_key.clone()),
        webhook_url: non_empty(&payload.webhook_url),
        is_external: true,
        created_at: Utc::now(),
    };

    if agent.bio.is_none() {
        agent.bio = state
            .content
            .bio(&agent)
            .await
            .map(|bio| bio.chars().take(MAX_BIO_CHARS).collect());
    }

    if let Err(e) = repo.create(&agent) {
        // Lost a race with another registration of the same name
        if e.downcast_ref::<rusqlite::Error>().is_some_and(is_unique_violation) {
            return Err(ApiError::Conflict(format!(
                "Username '{}' is already taken",
                payload.username
            )));
        }
        return Err(e.into());
    }

    tracing::info!("Registered external agent @{}", agent.username);
    Ok((StatusCode::CREATED, Json(RegisterAgentResponse { agent, api_key })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{testing::MemoryStore, AssetMaterializer};
    use crate::config::Settings;
    use crate::db::Database;
    use crate::generation::{testing::ScriptedText, ContentGenerator};
    use crate::webhook::WebhookNotifier;
    use std::sync::Arc;

    fn state_with_text(text: Option<ScriptedText>) -> AppState {
        let db = Database::in_memory().expect("Failed to create in-memory database");
        db.initialize().expect("Failed to initialize database");
        let content = ContentGenerator::new(
            text.map(|t| Arc::new(t) as Arc<dyn crate::generation::TextGenerator>),
            None,
        );
        AppState::new(
            db,
            Settings::new().expect("Failed to load settings"),
            content,
            AssetMaterializer::new(reqwest::Client::new(), Arc::new(MemoryStore)),
            WebhookNotifier::new(reqwest::Client::new()),
        )
    }

    fn request(username: &str) -> RegisterAgentRequest {
        RegisterAgentRequest {
            username: username.to_string(),
            display_name: "Test Bot".to_string(),
            bio: None,
            personality_prompt: None,
            visual_description: None,
            webhook_url: None,
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_registration(&request("ok_bot_42")).is_ok());
        assert!(validate_registration(&request("ab")).is_err());
        assert!(validate_registration(&request("Has Spaces")).is_err());
        assert!(validate_registration(&request(&"x".repeat(31))).is_err());
    }

    #[test]
    fn test_webhook_must_be_http() {
        let mut req = request("hooked_bot");
        req.webhook_url = Some("ftp://example.com/hook".to_string());
        assert!(validate_registration(&req).is_err());
        req.webhook_url = Some("https://example.com/hook".to_string());
        assert!(validate_registration(&req).is_ok());
    }

    #[tokio::test]
    async fn test_missing_bio_is_written_in_character() {
        let state = state_with_text(Some(ScriptedText::always("Chasing light in every city")));
        let (status, Json(created)) = register_agent(State(state.clone()), Json(request("bio_bot")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.agent.bio.as_deref(), Some("Chasing light in every city"));

        let stored = AgentRepository::new(state.db.pool.clone())
            .get_by_username("bio_bot")
            .unwrap()
            .unwrap();
        assert_eq!(stored.bio, created.agent.bio);
    }

    #[tokio::test]
    async fn test_given_bio_is_kept_and_offline_leaves_none() {
        let state = state_with_text(Some(ScriptedText::always("should not be used")));
        let mut req = request("own_words");
        req.bio = Some("Hand-written bio".to_string());
        let (_, Json(created)) = register_agent(State(state), Json(req)).await.unwrap();
        assert_eq!(created.agent.bio.as_deref(), Some("Hand-written bio"));

        let state = state_with_text(None);
        let (_, Json(created)) = register_agent(State(state), Json(request("plain_bot"))).await.unwrap();
        assert!(created.agent.bio.is_none());
    }
}
