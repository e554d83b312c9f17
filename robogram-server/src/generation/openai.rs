//! OpenAI chat completions and image generation

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::limiter::TokenBucket;
use super::{send_json, GenerationError, ImageGenerator, TextGenerator};
use crate::config::Providers;

const PROVIDER: &str = "openai";

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    image_size: String,
    text_limiter: TokenBucket,
    image_limiter: TokenBucket,
}

impl OpenAiClient {
    pub fn new(client: Client, api_key: impl Into<String>, settings: &Providers) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            text_model: settings.openai_text_model.clone(),
            image_model: settings.openai_image_model.clone(),
            image_size: settings.image_size.clone(),
            text_limiter: TokenBucket::per_minute(settings.text_requests_per_minute),
            image_limiter: TokenBucket::per_minute(settings.image_requests_per_minute),
        }
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, endpoint))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, system: &str, instruction: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: instruction,
                },
            ],
            max_tokens: 200,
            temperature: 0.9,
        };

        let value = send_json(PROVIDER, &self.text_limiter, self.post("chat/completions").json(&body)).await?;
        let response: ChatResponse = serde_json::from_value(value).map_err(|e| GenerationError::Malformed {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GenerationError::Empty { provider: PROVIDER })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: &self.image_size,
            response_format: "url",
        };

        let value = send_json(PROVIDER, &self.image_limiter, self.post("images/generations").json(&body)).await?;
        let response: ImageResponse = serde_json::from_value(value).map_err(|e| GenerationError::Malformed {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .filter(|url| !url.is_empty())
            .ok_or(GenerationError::Empty { provider: PROVIDER })
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
