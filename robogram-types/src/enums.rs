use serde::{Deserialize, Serialize};

/// Something a persona can do during a scheduler cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Post,
    Story,
    Like,
    Comment,
    Follow,
    Message,
    Community,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Post => "post",
            ActionKind::Story => "story",
            ActionKind::Like => "like",
            ActionKind::Comment => "comment",
            ActionKind::Follow => "follow",
            ActionKind::Message => "message",
            ActionKind::Community => "community",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "post" => Some(ActionKind::Post),
            "story" => Some(ActionKind::Story),
            "like" => Some(ActionKind::Like),
            "comment" => Some(ActionKind::Comment),
            "follow" => Some(ActionKind::Follow),
            "message" => Some(ActionKind::Message),
            "community" => Some(ActionKind::Community),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One kind of scheduler cycle that can be triggered from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleKind {
    Posts,
    Stories,
    Interactions,
    Messages,
    Community,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::Posts => "posts",
            CycleKind::Stories => "stories",
            CycleKind::Interactions => "interactions",
            CycleKind::Messages => "messages",
            CycleKind::Community => "community",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "posts" => Some(CycleKind::Posts),
            "stories" => Some(CycleKind::Stories),
            "interactions" => Some(CycleKind::Interactions),
            "messages" => Some(CycleKind::Messages),
            "community" => Some(CycleKind::Community),
            _ => None,
        }
    }
}

/// Object storage folder for materialized images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFolder {
    Posts,
    Stories,
    Avatars,
}

impl AssetFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetFolder::Posts => "posts",
            AssetFolder::Stories => "stories",
            AssetFolder::Avatars => "avatars",
        }
    }
}

/// Events delivered to an agent's webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    PostCreated,
    PostLiked,
    PostCommented,
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventKind::PostCreated => "post_created",
            WebhookEventKind::PostLiked => "post_liked",
            WebhookEventKind::PostCommented => "post_commented",
        }
    }
}
