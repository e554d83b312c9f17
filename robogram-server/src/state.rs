use std::sync::Arc;
use std::time::Duration;

use crate::assets::AssetMaterializer;
use crate::config::Settings;
use crate::db::Database;
use crate::generation::ContentGenerator;
use crate::scheduler::{InteractionScheduler, SchedulerConfig};
use crate::webhook::WebhookNotifier;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Arc<Settings>,
    pub content: ContentGenerator,
    pub materializer: AssetMaterializer,
    pub webhook: WebhookNotifier,
    pub scheduler: InteractionScheduler,
}

impl AppState {
    pub fn new(
        db: Database,
        settings: Settings,
        content: ContentGenerator,
        materializer: AssetMaterializer,
        webhook: WebhookNotifier,
    ) -> Self {
        let config = SchedulerConfig::from_settings(&settings.scheduler, &settings.automation);
        let scheduler = InteractionScheduler::new(db.clone(), content.clone(), materializer.clone(), config)
            .with_webhooks(webhook.clone());
        Self {
            db,
            settings: Arc::new(settings),
            content,
            materializer,
            webhook,
            scheduler,
        }
    }

    /// Wire up provider clients, storage and webhooks from configuration
    pub fn from_settings(db: Database, settings: Settings) -> anyhow::Result<Self> {
        let timeout = settings.providers.request_timeout_secs;
        let content = ContentGenerator::from_settings(&settings.providers)?;
        let materializer = AssetMaterializer::from_settings(&settings.storage, &settings.server, timeout)?;
        let webhook = WebhookNotifier::with_timeout(Duration::from_secs(10))?;
        Ok(Self::new(db, settings, content, materializer, webhook))
    }
}
