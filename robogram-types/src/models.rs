use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{ActionKind, WebhookEventKind};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

mod optional_datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_some(&date.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A bot persona. The descriptive fields are fed verbatim to the generators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub personality_prompt: String,
    pub visual_description: String,
    pub avatar_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    /// Never serialized; the key is handed out once at registration
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub is_external: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub agent_username: String,
    pub image_url: String,
    pub caption: String,
    pub like_count: i64,
    pub comment_count: i64,
    /// Publication time for posts queued ahead of time
    #[serde(default, with = "optional_datetime_format")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub is_published: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub agent_id: Uuid,
    #[serde(default)]
    pub agent_username: String,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub post_id: Uuid,
    pub agent_id: Uuid,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub agent_id: Uuid,
    #[serde(default)]
    pub agent_username: String,
    pub image_url: String,
    pub caption: Option<String>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_format")]
    pub expires_at: DateTime<Utc>,
}

impl Story {
    /// A story is visible until its expiry passes
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityMessage {
    pub id: Uuid,
    pub agent_id: Uuid,
    #[serde(default)]
    pub agent_username: String,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// A DM thread between two personas. `agent_a` always sorts before `agent_b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConversation {
    pub id: Uuid,
    pub agent_a: Uuid,
    pub agent_b: Uuid,
    pub last_message: Option<String>,
    #[serde(default, with = "optional_datetime_format")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    #[serde(default)]
    pub sender_username: String,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub is_external: bool,
}

// Scheduler reporting

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSummary {
    pub kind: ActionKind,
    pub actor: String,
    pub target: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub performed: Vec<ActionSummary>,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn record(&mut self, summary: ActionSummary) {
        self.performed.push(summary);
    }

    pub fn merge(&mut self, other: CycleReport) {
        self.performed.extend(other.performed);
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReconcileReport {
    pub agents_updated: usize,
    pub posts_updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    pub post_id: Uuid,
    pub actor_id: Uuid,
    pub actor_username: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

// Request/Response types for API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub generate_image: bool,
    /// Scene used for generated images and captions
    #[serde(default)]
    pub scene: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub personality_prompt: Option<String>,
    #[serde(default)]
    pub visual_description: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    pub agent: Agent,
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub post_id: Uuid,
    pub like_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutomationStatus {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_agent() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            username: "luna_lens".to_string(),
            display_name: "Luna".to_string(),
            bio: None,
            personality_prompt: "You are Luna.".to_string(),
            visual_description: "film photo".to_string(),
            avatar_url: None,
            follower_count: 0,
            following_count: 0,
            api_key: Some("rg_secret".to_string()),
            webhook_url: None,
            is_external: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_agent_api_key_is_never_serialized() {
        let json = serde_json::to_value(sample_agent()).unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["username"], "luna_lens");
    }

    #[test]
    fn test_story_activity_window() {
        let now = Utc::now();
        let story = Story {
            id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            agent_username: String::new(),
            image_url: "https://cdn/x.png".to_string(),
            caption: None,
            created_at: now - Duration::hours(1),
            expires_at: now + Duration::hours(23),
        };
        assert!(story.is_active(now));
        assert!(!story.is_active(now + Duration::hours(23)));
    }

    #[test]
    fn test_create_post_request_defaults() {
        let req: CreatePostRequest = serde_json::from_str(r#"{"generate_image": true}"#).unwrap();
        assert!(req.generate_image);
        assert!(req.image_url.is_none());
        assert!(req.caption.is_none());
    }

    #[test]
    fn test_cycle_report_merge() {
        let mut a = CycleReport {
            skipped: 1,
            ..Default::default()
        };
        a.record(ActionSummary {
            kind: ActionKind::Like,
            actor: "a".into(),
            target: Some("p".into()),
            detail: None,
        });
        let b = CycleReport {
            performed: Vec::new(),
            skipped: 2,
            failed: 1,
        };
        a.merge(b);
        assert_eq!(a.performed.len(), 1);
        assert_eq!(a.skipped, 3);
        assert_eq!(a.failed, 1);
    }
}
