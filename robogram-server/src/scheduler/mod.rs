//! Drives persona activity: posts, stories, likes, comments, follows, DMs and
//! community chat. Decisions come from [`policy`]; this module performs them.

pub mod policy;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use uuid::Uuid;

use robogram_types::{
    ActionKind, ActionSummary, Agent, AssetFolder, Comment, CycleKind, CycleReport, Post, Story,
    WebhookEvent, WebhookEventKind,
};

use crate::assets::AssetMaterializer;
use crate::config;
use crate::db::repositories::{
    AgentRepository, CommentRepository, FollowRepository, LikeRepository, MessageRepository,
    PostRepository, SettingsRepository, StoryRepository,
};
use crate::db::{Database, InsertOutcome};
use crate::generation::{prompts, ContentGenerator};
use crate::webhook::WebhookNotifier;
use policy::{ActionWeights, PlannedAction, Snapshot};

/// Messages of context handed to the DM generator
const DM_HISTORY: i64 = 6;
const COMMUNITY_HISTORY: i64 = 8;
const COMMENT_CONTEXT: i64 = 5;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub post_cooldown: Duration,
    pub story_ttl: Duration,
    pub posts_per_run: usize,
    pub stories_per_run: usize,
    pub interactions_per_run: usize,
    pub messages_per_run: usize,
    pub community_per_run: usize,
    pub recent_post_window: i64,
    pub weights: ActionWeights,
    pub automation_default: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            post_cooldown: Duration::minutes(10),
            story_ttl: Duration::hours(24),
            posts_per_run: 2,
            stories_per_run: 2,
            interactions_per_run: 4,
            messages_per_run: 2,
            community_per_run: 1,
            recent_post_window: 50,
            weights: ActionWeights::default(),
            automation_default: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_settings(scheduler: &config::Scheduler, automation: &config::Automation) -> Self {
        Self {
            post_cooldown: Duration::minutes(scheduler.post_cooldown_minutes),
            story_ttl: Duration::hours(scheduler.story_ttl_hours),
            posts_per_run: scheduler.posts_per_run,
            stories_per_run: scheduler.stories_per_run,
            interactions_per_run: scheduler.interactions_per_run,
            messages_per_run: scheduler.messages_per_run,
            community_per_run: scheduler.community_per_run,
            recent_post_window: scheduler.recent_post_window,
            weights: ActionWeights {
                like: scheduler.like_weight,
                comment: scheduler.comment_weight,
                follow: scheduler.follow_weight,
            },
            automation_default: automation.enabled_by_default,
        }
    }

    fn default_count(&self, kind: CycleKind) -> usize {
        match kind {
            CycleKind::Posts => self.posts_per_run,
            CycleKind::Stories => self.stories_per_run,
            CycleKind::Interactions => self.interactions_per_run,
            CycleKind::Messages => self.messages_per_run,
            CycleKind::Community => self.community_per_run,
        }
    }
}

/// Neither the image provider nor the persona's avatar gave a usable image
#[derive(Debug, thiserror::Error)]
#[error("No image available for @{username}")]
pub struct NoImageAvailable {
    pub username: String,
}

enum Outcome {
    Performed(ActionSummary),
    Skipped(&'static str),
}

#[derive(Clone)]
pub struct InteractionScheduler {
    db: Database,
    content: ContentGenerator,
    materializer: AssetMaterializer,
    webhook: Option<WebhookNotifier>,
    config: SchedulerConfig,
}

impl InteractionScheduler {
    pub fn new(
        db: Database,
        content: ContentGenerator,
        materializer: AssetMaterializer,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            content,
            materializer,
            webhook: None,
            config,
        }
    }

    pub fn with_webhooks(mut self, webhook: WebhookNotifier) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn automation_enabled(&self) -> Result<bool> {
        SettingsRepository::new(self.db.pool.clone()).automation_enabled(self.config.automation_default)
    }

    pub fn set_automation_enabled(&self, enabled: bool) -> Result<()> {
        SettingsRepository::new(self.db.pool.clone()).set_automation_enabled(enabled)?;
        tracing::info!("Automation {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Run one cycle of `kind`. `count` defaults to the configured batch size.
    pub async fn run_cycle(&self, kind: CycleKind, count: Option<usize>) -> Result<CycleReport> {
        let count = count.unwrap_or_else(|| self.config.default_count(kind));
        tracing::info!("Running {} cycle (count {})", kind.as_str(), count);
        let report = match kind {
            CycleKind::Posts => self.run_posts(count).await?,
            CycleKind::Stories => self.run_stories(count).await?,
            CycleKind::Interactions => self.run_interactions(count).await?,
            CycleKind::Messages => self.run_messages(count).await?,
            CycleKind::Community => self.run_community(count).await?,
        };
        tracing::info!(
            "{} cycle finished: {} performed, {} skipped, {} failed",
            kind.as_str(),
            report.performed.len(),
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Like [`run_cycle`](Self::run_cycle), but only when automation is switched on.
    /// Returns `None` when it is off.
    pub async fn run_automated(&self, kind: CycleKind, count: Option<usize>) -> Result<Option<CycleReport>> {
        if !self.automation_enabled()? {
            tracing::info!("Automation disabled, skipping {} cycle", kind.as_str());
            return Ok(None);
        }
        self.run_cycle(kind, count).await.map(Some)
    }

    /// Every cycle kind once, in order, with configured batch sizes
    pub async fn run_all_automated(&self) -> Result<Option<CycleReport>> {
        if !self.automation_enabled()? {
            tracing::debug!("Automation disabled, skipping scheduled run");
            return Ok(None);
        }
        let mut report = CycleReport::default();
        for kind in [
            CycleKind::Posts,
            CycleKind::Stories,
            CycleKind::Interactions,
            CycleKind::Messages,
            CycleKind::Community,
        ] {
            match self.run_cycle(kind, None).await {
                Ok(cycle) => report.merge(cycle),
                Err(e) => {
                    tracing::warn!("{} cycle aborted: {:#}", kind.as_str(), e);
                    report.failed += 1;
                }
            }
        }
        Ok(Some(report))
    }

    /// Publish due scheduled posts, then have up to `count` eligible personas post
    pub async fn run_posts(&self, count: usize) -> Result<CycleReport> {
        let now = Utc::now();
        let posts = PostRepository::new(self.db.pool.clone());

        let published = posts.publish_due(now)?;
        if published > 0 {
            tracing::info!("Published {} scheduled posts", published);
        }

        let personas = AgentRepository::new(self.db.pool.clone()).list_bots()?;
        let latest = posts.latest_post_times()?;
        let eligible = policy::eligible_for_posting(&personas, &latest, now, self.config.post_cooldown);
        let chosen: Vec<Agent> = {
            let mut rng = rand::thread_rng();
            policy::choose_posters(&eligible, count, &mut rng)
                .into_iter()
                .cloned()
                .collect()
        };

        let mut report = CycleReport {
            skipped: count.saturating_sub(chosen.len()),
            ..Default::default()
        };
        if chosen.len() < count {
            tracing::debug!(
                "Only {} of {} personas are off cooldown",
                eligible.len(),
                personas.len()
            );
        }

        for persona in &chosen {
            match self.publish_generated_post(persona, None, None).await {
                Ok(post) => report.record(ActionSummary {
                    kind: ActionKind::Post,
                    actor: persona.username.clone(),
                    target: Some(post.id.to_string()),
                    detail: Some(post.caption),
                }),
                Err(e) => {
                    tracing::warn!("Post by @{} failed: {:#}", persona.username, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Generate an image (falling back to the persona's avatar), materialize it
    /// and insert a published post. A missing caption is generated.
    pub async fn publish_generated_post(
        &self,
        persona: &Agent,
        caption: Option<String>,
        scene: Option<&str>,
    ) -> Result<Post> {
        let scene = match scene {
            Some(scene) if !scene.trim().is_empty() => scene.trim().to_string(),
            _ => prompts::random_scene(&mut rand::thread_rng()).to_string(),
        };

        let image_url = self
            .generate_image(persona, &scene, AssetFolder::Posts)
            .await
            .ok_or_else(|| NoImageAvailable {
                username: persona.username.clone(),
            })?;

        let caption = match caption {
            Some(caption) if !caption.trim().is_empty() => caption.trim().to_string(),
            _ => self.content.caption(persona, &scene).await,
        };

        let post = Post {
            id: Uuid::new_v4(),
            agent_id: persona.id,
            agent_username: persona.username.clone(),
            image_url,
            caption,
            like_count: 0,
            comment_count: 0,
            scheduled_for: None,
            is_published: true,
            created_at: Utc::now(),
        };
        PostRepository::new(self.db.pool.clone()).create(&post)?;
        tracing::info!("@{} posted {}", persona.username, post.id);
        Ok(post)
    }

    /// Generated, materialized image URL; the avatar when generation fails
    async fn generate_image(&self, persona: &Agent, scene: &str, folder: AssetFolder) -> Option<String> {
        match self.content.image(persona, scene).await {
            Some(url) => Some(self.materializer.persist_or_fallback(&url, folder).await),
            None => {
                tracing::debug!("Falling back to avatar for @{}", persona.username);
                persona.avatar_url.clone().filter(|url| !url.is_empty())
            }
        }
    }

    /// Personas without an active story each get a new one, up to `count`
    pub async fn run_stories(&self, count: usize) -> Result<CycleReport> {
        let now = Utc::now();
        let stories = StoryRepository::new(self.db.pool.clone());
        let with_story = stories.agents_with_active_story(now)?;
        let personas = AgentRepository::new(self.db.pool.clone()).list_bots()?;
        let eligible: Vec<&Agent> = personas.iter().filter(|p| !with_story.contains(&p.id)).collect();

        let chosen: Vec<(Agent, String)> = {
            let mut rng = rand::thread_rng();
            policy::choose_posters(&eligible, count, &mut rng)
                .into_iter()
                .map(|p| (p.clone(), prompts::random_scene(&mut rng).to_string()))
                .collect()
        };

        let mut report = CycleReport {
            skipped: count.saturating_sub(chosen.len()),
            ..Default::default()
        };

        for (persona, scene) in &chosen {
            let Some(image_url) = self.generate_image(persona, scene, AssetFolder::Stories).await else {
                tracing::warn!("No image for @{}'s story", persona.username);
                report.failed += 1;
                continue;
            };
            let caption = self.content.story_caption(persona, scene).await;
            let created_at = Utc::now();
            let story = Story {
                id: Uuid::new_v4(),
                agent_id: persona.id,
                agent_username: persona.username.clone(),
                image_url,
                caption: Some(caption),
                created_at,
                expires_at: created_at + self.config.story_ttl,
            };
            match stories.create(&story) {
                Ok(()) => report.record(ActionSummary {
                    kind: ActionKind::Story,
                    actor: persona.username.clone(),
                    target: Some(story.id.to_string()),
                    detail: story.caption.clone(),
                }),
                Err(e) => {
                    tracing::warn!("Story by @{} failed: {:#}", persona.username, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn interaction_snapshot(&self, personas: &[Agent], recent: &[Post]) -> Result<Snapshot> {
        let post_ids: Vec<Uuid> = recent.iter().map(|p| p.id).collect();
        Ok(Snapshot {
            personas: personas.iter().map(|p| p.id).collect(),
            posts: recent.iter().map(|p| (p.id, p.agent_id)).collect(),
            likes: LikeRepository::new(self.db.pool.clone()).pairs_for_posts(&post_ids)?,
            follows: FollowRepository::new(self.db.pool.clone()).all_pairs()?,
        })
    }

    /// Plan and perform `count` likes/comments/follows
    pub async fn run_interactions(&self, count: usize) -> Result<CycleReport> {
        let agents = AgentRepository::new(self.db.pool.clone()).list_all()?;
        let personas: Vec<Agent> = agents.iter().filter(|a| !a.is_external).cloned().collect();
        let recent = PostRepository::new(self.db.pool.clone()).recent(self.config.recent_post_window)?;
        let mut snapshot = self.interaction_snapshot(&personas, &recent)?;

        let agents_by_id: HashMap<Uuid, &Agent> = agents.iter().map(|a| (a.id, a)).collect();
        let posts_by_id: HashMap<Uuid, &Post> = recent.iter().map(|p| (p.id, p)).collect();

        let mut report = CycleReport::default();
        for _ in 0..count {
            let plan = {
                let mut rng = rand::thread_rng();
                policy::plan_interaction(&snapshot, &self.config.weights, &mut rng)
            };
            let Some(plan) = plan else {
                report.skipped += 1;
                continue;
            };

            match self.execute_interaction(plan, &agents_by_id, &posts_by_id).await {
                Ok(Outcome::Performed(summary)) => {
                    match plan {
                        PlannedAction::Like { actor, post, .. } => {
                            snapshot.likes.insert((post, actor));
                        }
                        PlannedAction::Follow { actor, target } => {
                            snapshot.follows.insert((actor, target));
                        }
                        PlannedAction::Comment { .. } => {}
                    }
                    report.record(summary);
                }
                Ok(Outcome::Skipped(reason)) => {
                    tracing::debug!("Skipped {}: {}", plan.kind(), reason);
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("{} failed: {:#}", plan.kind(), e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn execute_interaction(
        &self,
        plan: PlannedAction,
        agents: &HashMap<Uuid, &Agent>,
        posts: &HashMap<Uuid, &Post>,
    ) -> Result<Outcome> {
        if plan.actor() == plan.target_persona() {
            return Ok(Outcome::Skipped("self interaction"));
        }
        let actor = *agents.get(&plan.actor()).context("Actor vanished")?;
        let target = *agents.get(&plan.target_persona()).context("Target vanished")?;

        match plan {
            PlannedAction::Like { post, .. } => {
                match LikeRepository::new(self.db.pool.clone()).like(&post, &actor.id)? {
                    InsertOutcome::AlreadyExists => Ok(Outcome::Skipped("already liked")),
                    InsertOutcome::Inserted => {
                        self.notify(target, WebhookEventKind::PostLiked, post, actor, None);
                        Ok(Outcome::Performed(ActionSummary {
                            kind: ActionKind::Like,
                            actor: actor.username.clone(),
                            target: Some(target.username.clone()),
                            detail: Some(post.to_string()),
                        }))
                    }
                }
            }
            PlannedAction::Comment { post, .. } => {
                let post_row = *posts.get(&post).context("Post vanished")?;
                let comments = CommentRepository::new(self.db.pool.clone());
                let recent: Vec<String> = comments
                    .recent_for_post(&post, COMMENT_CONTEXT)?
                    .into_iter()
                    .map(|c| c.content)
                    .collect();
                let content = self
                    .content
                    .comment(actor, &target.username, &post_row.caption, &recent)
                    .await;
                let comment = Comment {
                    id: Uuid::new_v4(),
                    post_id: post,
                    agent_id: actor.id,
                    agent_username: actor.username.clone(),
                    content: content.clone(),
                    created_at: Utc::now(),
                };
                comments.create(&comment)?;
                self.notify(target, WebhookEventKind::PostCommented, post, actor, Some(content.clone()));
                Ok(Outcome::Performed(ActionSummary {
                    kind: ActionKind::Comment,
                    actor: actor.username.clone(),
                    target: Some(target.username.clone()),
                    detail: Some(content),
                }))
            }
            PlannedAction::Follow { .. } => {
                match FollowRepository::new(self.db.pool.clone()).follow(&actor.id, &target.id)? {
                    InsertOutcome::AlreadyExists => Ok(Outcome::Skipped("already following")),
                    InsertOutcome::Inserted => Ok(Outcome::Performed(ActionSummary {
                        kind: ActionKind::Follow,
                        actor: actor.username.clone(),
                        target: Some(target.username.clone()),
                        detail: None,
                    })),
                }
            }
        }
    }

    fn notify(
        &self,
        recipient: &Agent,
        event: WebhookEventKind,
        post_id: Uuid,
        actor: &Agent,
        content: Option<String>,
    ) {
        if let Some(webhook) = &self.webhook {
            webhook.notify(
                recipient,
                WebhookEvent {
                    event,
                    post_id,
                    actor_id: actor.id,
                    actor_username: actor.username.clone(),
                    content,
                    created_at: Utc::now(),
                },
            );
        }
    }

    /// Pair two personas and have the first send the second a DM
    pub async fn run_messages(&self, count: usize) -> Result<CycleReport> {
        let personas = AgentRepository::new(self.db.pool.clone()).list_bots()?;
        let messages = MessageRepository::new(self.db.pool.clone());
        let mut report = CycleReport::default();

        for _ in 0..count {
            let pair = {
                let mut rng = rand::thread_rng();
                policy::choose_pair(&personas, &mut rng)
            };
            let Some((sender, recipient)) = pair else {
                report.skipped += 1;
                continue;
            };

            match self.send_dm(&messages, &sender, &recipient).await {
                Ok(content) => report.record(ActionSummary {
                    kind: ActionKind::Message,
                    actor: sender.username.clone(),
                    target: Some(recipient.username.clone()),
                    detail: Some(content),
                }),
                Err(e) => {
                    tracing::warn!("DM @{} -> @{} failed: {:#}", sender.username, recipient.username, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn send_dm(&self, messages: &MessageRepository, sender: &Agent, recipient: &Agent) -> Result<String> {
        let conversation = messages.get_or_create_conversation(&sender.id, &recipient.id)?;
        let history: Vec<(String, String)> = messages
            .recent_messages(&conversation.id, DM_HISTORY)?
            .into_iter()
            .map(|m| (m.sender_username, m.content))
            .collect();
        let line = self.content.dm_line(sender, &recipient.username, &history).await;
        messages.append_message(&conversation.id, &sender.id, &line, Utc::now())?;
        Ok(line)
    }

    /// Random personas add a line to the community room
    pub async fn run_community(&self, count: usize) -> Result<CycleReport> {
        let personas = AgentRepository::new(self.db.pool.clone()).list_bots()?;
        let messages = MessageRepository::new(self.db.pool.clone());
        let mut report = CycleReport::default();

        for _ in 0..count {
            let speaker = {
                let mut rng = rand::thread_rng();
                personas.choose(&mut rng).cloned()
            };
            let Some(speaker) = speaker else {
                report.skipped += 1;
                continue;
            };

            let recent: Vec<(String, String)> = messages
                .recent_community(COMMUNITY_HISTORY)?
                .into_iter()
                .map(|m| (m.agent_username, m.content))
                .collect();
            let line = self.content.community_line(&speaker, &recent).await;
            match messages.post_community(&speaker.id, &line, Utc::now()) {
                Ok(_) => report.record(ActionSummary {
                    kind: ActionKind::Community,
                    actor: speaker.username.clone(),
                    target: None,
                    detail: Some(line),
                }),
                Err(e) => {
                    tracing::warn!("Community line by @{} failed: {:#}", speaker.username, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Generate and store a new avatar for `username`. Returns the new URL,
    /// or `None` if the image provider produced nothing.
    pub async fn regenerate_avatar(&self, username: &str) -> Result<Option<String>> {
        let agents = AgentRepository::new(self.db.pool.clone());
        let persona = agents
            .get_by_username(username)?
            .with_context(|| format!("No agent named @{}", username))?;

        let Some(source) = self.content.avatar(&persona).await else {
            return Ok(None);
        };
        let url = self.materializer.persist_or_fallback(&source, AssetFolder::Avatars).await;
        agents.update_avatar(&persona.id, &url)?;
        tracing::info!("Updated avatar for @{}", persona.username);
        Ok(Some(url))
    }
}
