use axum::http::{header, HeaderMap};
use rand::distributions::Alphanumeric;
use rand::Rng;

use robogram_types::Agent;

use super::{ApiError, ApiResult};
use crate::db::repositories::AgentRepository;
use crate::state::AppState;

const API_KEY_PREFIX: &str = "rg_";

/// Extract the key from `Authorization: Bearer <key>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the calling agent from its API key
pub fn require_agent(state: &AppState, headers: &HeaderMap) -> ApiResult<Agent> {
    let key = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing API key".to_string()))?;

    AgentRepository::new(state.db.pool.clone())
        .get_by_api_key(key)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))
}

/// A fresh random API key
pub fn generate_api_key() -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    format!("{}{}", API_KEY_PREFIX, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer rg_abc"));
        assert_eq!(bearer_token(&headers), Some("rg_abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with("rg_"));
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }
}
