use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build links to locally stored media
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
    pub seed_personas: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
    /// "openai" or "gemini"
    pub text_provider: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_text_model: String,
    pub openai_image_model: String,
    pub image_size: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub text_requests_per_minute: u32,
    pub image_requests_per_minute: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    /// "local" or "supabase"
    pub backend: String,
    pub local_dir: String,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    pub supabase_bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scheduler {
    pub post_cooldown_minutes: i64,
    pub story_ttl_hours: i64,
    pub posts_per_run: usize,
    pub stories_per_run: usize,
    pub interactions_per_run: usize,
    pub messages_per_run: usize,
    pub community_per_run: usize,
    pub recent_post_window: i64,
    pub like_weight: u32,
    pub comment_weight: u32,
    pub follow_weight: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Automation {
    /// Value of the persisted switch until someone flips it
    pub enabled_by_default: bool,
    pub cron_secret: Option<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// In-process cycle interval; 0 leaves triggering to an external cron
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub providers: Providers,
    pub storage: Storage,
    pub scheduler: Scheduler,
    pub automation: Automation,
}

/// Environment variables that override individual settings
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("PUBLIC_URL", "server.public_url"),
    ("DATABASE_PATH", "database.path"),
    ("TEXT_PROVIDER", "providers.text_provider"),
    ("OPENAI_API_KEY", "providers.openai_api_key"),
    ("OPENAI_BASE_URL", "providers.openai_base_url"),
    ("GEMINI_API_KEY", "providers.gemini_api_key"),
    ("STORAGE_BACKEND", "storage.backend"),
    ("MEDIA_DIR", "storage.local_dir"),
    ("SUPABASE_URL", "storage.supabase_url"),
    ("SUPABASE_SERVICE_KEY", "storage.supabase_service_key"),
    ("SUPABASE_BUCKET", "storage.supabase_bucket"),
    ("POST_COOLDOWN_MINUTES", "scheduler.post_cooldown_minutes"),
    ("CRON_SECRET", "automation.cron_secret"),
    ("AUTOMATION_INTERVAL_SECS", "automation.interval_secs"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in robogram-server directory (for development)
        let dev_path = PathBuf::from("robogram-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.path", "robogram.db")?
            .set_default("database.seed_personas", true)?
            .set_default("providers.text_provider", "openai")?
            .set_default("providers.openai_base_url", "https://api.openai.com/v1")?
            .set_default("providers.openai_text_model", "gpt-4o-mini")?
            .set_default("providers.openai_image_model", "dall-e-3")?
            .set_default("providers.image_size", "1024x1024")?
            .set_default(
                "providers.gemini_base_url",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("providers.gemini_model", "gemini-1.5-flash")?
            .set_default("providers.text_requests_per_minute", 60)?
            .set_default("providers.image_requests_per_minute", 5)?
            .set_default("providers.request_timeout_secs", 60)?
            .set_default("storage.backend", "local")?
            .set_default("storage.local_dir", "media")?
            .set_default("storage.supabase_bucket", "images")?
            .set_default("scheduler.post_cooldown_minutes", 10)?
            .set_default("scheduler.story_ttl_hours", 24)?
            .set_default("scheduler.posts_per_run", 2)?
            .set_default("scheduler.stories_per_run", 2)?
            .set_default("scheduler.interactions_per_run", 4)?
            .set_default("scheduler.messages_per_run", 2)?
            .set_default("scheduler.community_per_run", 1)?
            .set_default("scheduler.recent_post_window", 50)?
            .set_default("scheduler.like_weight", 45)?
            .set_default("scheduler.comment_weight", 35)?
            .set_default("scheduler.follow_weight", 20)?
            .set_default("automation.enabled_by_default", true)?
            .set_default("automation.interval_secs", 0)?;

        // 2. Override with environment variables (highest priority)
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(*key, value)?;
            }
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            builder = builder.set_override("automation.allowed_origins", origins)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_file() {
        let settings = Settings::new().expect("defaults should deserialize");
        assert_eq!(settings.scheduler.like_weight, 45);
        assert_eq!(settings.scheduler.comment_weight, 35);
        assert_eq!(settings.scheduler.follow_weight, 20);
        assert_eq!(settings.providers.image_size, "1024x1024");
        assert_eq!(settings.scheduler.story_ttl_hours, 24);
    }
}
