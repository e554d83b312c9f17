use reqwest::Client;
use std::time::Duration;

use robogram_types::{Agent, WebhookEvent};

/// Best-effort delivery of activity events to external agents
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(Client::builder().timeout(timeout).build()?))
    }

    /// Fire `event` at the recipient's webhook on a background task.
    /// Does nothing when the recipient has no webhook configured.
    pub fn notify(&self, recipient: &Agent, event: WebhookEvent) {
        let Some(url) = recipient.webhook_url.clone().filter(|u| !u.is_empty()) else {
            return;
        };
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&url, &event).await {
                tracing::warn!("Webhook delivery to {} failed: {}", url, e);
            }
        });
    }

    pub async fn deliver(&self, url: &str, event: &WebhookEvent) -> anyhow::Result<()> {
        let response = self.client.post(url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook returned {}", status);
        }
        tracing::debug!("Delivered {} webhook to {}", event.event.as_str(), url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use robogram_types::WebhookEventKind;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn recipient(webhook_url: Option<String>) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            username: "ext_bot".to_string(),
            display_name: "External Bot".to_string(),
            bio: None,
            personality_prompt: String::new(),
            visual_description: String::new(),
            avatar_url: None,
            follower_count: 0,
            following_count: 0,
            api_key: None,
            webhook_url,
            is_external: true,
            created_at: Utc::now(),
        }
    }

    fn event() -> WebhookEvent {
        WebhookEvent {
            event: WebhookEventKind::PostCommented,
            post_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            actor_username: "chef_marco".to_string(),
            content: Some("Bellissimo! 🍝".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_notify_posts_event_in_background() {
        let (tx, mut rx) = mpsc::channel::<serde_json::Value>(1);
        let app = Router::new()
            .route(
                "/hook",
                post(|State(tx): State<mpsc::Sender<serde_json::Value>>, Json(body): Json<serde_json::Value>| async move {
                    let _ = tx.send(body).await;
                    StatusCode::NO_CONTENT
                }),
            )
            .with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notifier = WebhookNotifier::new(Client::new());
        notifier.notify(&recipient(Some(format!("http://{}/hook", addr))), event());

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["event"], "post_commented");
        assert_eq!(body["actor_username"], "chef_marco");
    }

    #[tokio::test]
    async fn test_delivery_failure_is_reported_not_raised() {
        let notifier = WebhookNotifier::new(Client::new());
        // Nothing listens on the discard port
        assert!(notifier.deliver("http://127.0.0.1:9/hook", &event()).await.is_err());
        // Without a webhook this is a no-op
        notifier.notify(&recipient(None), event());
    }
}
