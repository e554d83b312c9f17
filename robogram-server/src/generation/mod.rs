//! Text and image generation for personas.
//!
//! Provider clients sit behind [`TextGenerator`] and [`ImageGenerator`];
//! [`ContentGenerator`] turns their output into captions, comments and chat
//! lines and substitutes canned text whenever a provider fails.

pub mod gemini;
pub mod limiter;
pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use robogram_types::Agent;

use crate::config::Providers;
use gemini::GeminiClient;
use limiter::TokenBucket;
use openai::OpenAiClient;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{provider} request failed with status {status}: {message}")]
    Http {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned an error: {message}")]
    Provider { provider: &'static str, message: String },

    #[error("{provider} returned an empty response")]
    Empty { provider: &'static str },

    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: &'static str, message: String },

    #[error("{provider} rate limited the request")]
    RateLimited {
        provider: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text with `system` as the persona prompt and `instruction` as the task
    async fn generate(&self, system: &str, instruction: &str) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image and return its (usually short-lived) URL
    async fn generate_image(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Pull a message out of an error-shaped body (`{"error": "..."}` or `{"error": {"message": ...}}`)
fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// Send a provider request through its limiter and return the JSON body
pub(crate) async fn send_json(
    provider: &'static str,
    limiter: &TokenBucket,
    request: reqwest::RequestBuilder,
) -> Result<Value, GenerationError> {
    limiter.acquire().await;

    let response = request.send().await?;
    let status = response.status();
    limiter.observe_headers(response.headers());
    let retry_after = limiter::retry_after(response.headers());
    let body = response.text().await?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(GenerationError::RateLimited { provider, retry_after });
    }

    let parsed = serde_json::from_str::<Value>(&body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(error_message)
            .unwrap_or(body);
        return Err(GenerationError::Http {
            provider,
            status: status.as_u16(),
            message,
        });
    }

    let value = parsed.map_err(|e| GenerationError::Malformed {
        provider,
        message: e.to_string(),
    })?;
    if let Some(message) = error_message(&value) {
        return Err(GenerationError::Provider { provider, message });
    }
    Ok(value)
}

/// Persona-facing generation with canned fallbacks
#[derive(Clone)]
pub struct ContentGenerator {
    text: Option<Arc<dyn TextGenerator>>,
    image: Option<Arc<dyn ImageGenerator>>,
}

impl ContentGenerator {
    pub fn new(text: Option<Arc<dyn TextGenerator>>, image: Option<Arc<dyn ImageGenerator>>) -> Self {
        Self { text, image }
    }

    /// Build provider clients from configuration. Missing keys leave the
    /// matching capability unconfigured rather than failing startup.
    pub fn from_settings(settings: &Providers) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let openai: Option<Arc<OpenAiClient>> = settings
            .openai_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| Arc::new(OpenAiClient::new(client.clone(), key, settings)));

        let text: Option<Arc<dyn TextGenerator>> = match settings.text_provider.as_str() {
            "gemini" => settings
                .gemini_api_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(|key| Arc::new(GeminiClient::new(client.clone(), key, settings)) as Arc<dyn TextGenerator>),
            _ => openai.clone().map(|c| c as Arc<dyn TextGenerator>),
        };
        let image = openai.map(|c| c as Arc<dyn ImageGenerator>);

        if text.is_none() {
            tracing::warn!(
                "No API key for text provider '{}', using canned text",
                settings.text_provider
            );
        }
        if image.is_none() {
            tracing::warn!("No OpenAI API key, image generation disabled");
        }

        Ok(Self::new(text, image))
    }

    /// A generator with no providers; every call falls back
    pub fn offline() -> Self {
        Self::new(None, None)
    }

    fn system_prompt(persona: &Agent) -> String {
        format!(
            "{}\n\nYou are @{} ({}) on Robogram, a photo-sharing social app. Stay in character.",
            persona.personality_prompt.trim(),
            persona.username,
            persona.display_name
        )
    }

    /// Run a text task; `None` when the provider is missing, fails, or returns nothing usable
    async fn try_text(&self, persona: &Agent, instruction: &str, task: &str) -> Option<String> {
        let generator = self.text.as_ref()?;
        match generator.generate(&Self::system_prompt(persona), instruction).await {
            Ok(raw) => {
                let cleaned = prompts::clean_output(&raw);
                if cleaned.is_empty() {
                    tracing::warn!("Empty {} generated for @{}", task, persona.username);
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(e) => {
                tracing::warn!("Failed to generate {} for @{}: {}", task, persona.username, e);
                None
            }
        }
    }

    async fn text_or_fallback(
        &self,
        persona: &Agent,
        instruction: String,
        fallback: &[&'static str],
        task: &str,
    ) -> String {
        match self.try_text(persona, &instruction, task).await {
            Some(text) => text,
            None => prompts::pick_fallback(fallback, &mut rand::thread_rng()),
        }
    }

    pub async fn caption(&self, persona: &Agent, scene: &str) -> String {
        self.text_or_fallback(
            persona,
            prompts::caption_instruction(scene),
            prompts::FALLBACK_CAPTIONS,
            "caption",
        )
        .await
    }

    pub async fn story_caption(&self, persona: &Agent, scene: &str) -> String {
        self.text_or_fallback(
            persona,
            prompts::story_caption_instruction(scene),
            prompts::FALLBACK_CAPTIONS,
            "story caption",
        )
        .await
    }

    pub async fn comment(&self, persona: &Agent, author: &str, caption: &str, recent: &[String]) -> String {
        self.text_or_fallback(
            persona,
            prompts::comment_instruction(author, caption, recent),
            prompts::FALLBACK_COMMENTS,
            "comment",
        )
        .await
    }

    /// `history` is `(sender_username, content)`, oldest first
    pub async fn dm_line(&self, persona: &Agent, recipient: &str, history: &[(String, String)]) -> String {
        self.text_or_fallback(
            persona,
            prompts::dm_instruction(recipient, history),
            prompts::FALLBACK_DM_LINES,
            "DM",
        )
        .await
    }

    pub async fn community_line(&self, persona: &Agent, recent: &[(String, String)]) -> String {
        self.text_or_fallback(
            persona,
            prompts::community_instruction(recent),
            prompts::FALLBACK_COMMUNITY_LINES,
            "community line",
        )
        .await
    }

    pub async fn bio(&self, persona: &Agent) -> Option<String> {
        self.try_text(persona, &prompts::bio_instruction(), "bio").await
    }

    /// Generate a photo of the persona in `scene`. `None` on any failure.
    pub async fn image(&self, persona: &Agent, scene: &str) -> Option<String> {
        let prompt = prompts::compose_image_prompt(&persona.visual_description, scene);
        self.run_image(persona, &prompt).await
    }

    /// Generate a profile picture from the persona's full visual description
    pub async fn avatar(&self, persona: &Agent) -> Option<String> {
        let prompt = format!(
            "Profile picture. {}. Social media avatar, soft background, no text.",
            persona.visual_description.trim().trim_end_matches('.')
        );
        self.run_image(persona, &prompt).await
    }

    async fn run_image(&self, persona: &Agent, prompt: &str) -> Option<String> {
        let generator = self.image.as_ref()?;
        match generator.generate_image(prompt).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Failed to generate image for @{}: {}", persona.username, e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Text generator returning queued responses, then erroring
    #[derive(Default)]
    pub struct ScriptedText {
        responses: Mutex<Vec<Result<String, String>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedText {
        pub fn new(responses: Vec<Result<String, String>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn always(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string()); 256])
        }

        pub fn failing() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedText {
        async fn generate(&self, _system: &str, _instruction: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop();
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(GenerationError::Provider {
                    provider: "scripted",
                    message,
                }),
                None => Err(GenerationError::Empty { provider: "scripted" }),
            }
        }
    }

    /// Image generator that always returns `url`, or fails when `url` is `None`
    pub struct FixedImage(pub Option<String>);

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate_image(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.0.clone().ok_or(GenerationError::Http {
                provider: "fixed",
                status: 500,
                message: "image backend down".to_string(),
            })
        }
    }
}
