use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use robogram_types::{BotConversation, BotMessage, CommunityMessage};

use crate::db::{db_time, parse_opt_time, parse_time, parse_uuid, DbPool};

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<BotConversation> {
    Ok(BotConversation {
        id: parse_uuid(row.get(0)?, 0)?,
        agent_a: parse_uuid(row.get(1)?, 1)?,
        agent_b: parse_uuid(row.get(2)?, 2)?,
        last_message: row.get(3)?,
        last_message_at: parse_opt_time(row.get(4)?, 4)?,
        created_at: parse_time(row.get(5)?, 5)?,
    })
}

/// Conversation rows store the pair in a fixed order
fn ordered_pair(a: &Uuid, b: &Uuid) -> (Uuid, Uuid) {
    if a.to_string() <= b.to_string() {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

/// Bot DM conversations and the community chat room
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find the conversation between two agents, creating it on first contact
    pub fn get_or_create_conversation(&self, agent_x: &Uuid, agent_y: &Uuid) -> Result<BotConversation> {
        if agent_x == agent_y {
            anyhow::bail!("An agent cannot message itself");
        }
        let (agent_a, agent_b) = ordered_pair(agent_x, agent_y);
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT OR IGNORE INTO bot_conversations (id, agent_a, agent_b, created_at) VALUES (?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                agent_a.to_string(),
                agent_b.to_string(),
                db_time(Utc::now()),
            ),
        )
        .context("Failed to create conversation")?;

        let conversation = conn.query_row(
            "SELECT id, agent_a, agent_b, last_message, last_message_at, created_at
             FROM bot_conversations WHERE agent_a = ? AND agent_b = ?",
            (agent_a.to_string(), agent_b.to_string()),
            map_conversation,
        )?;
        Ok(conversation)
    }

    /// Append a message and refresh the conversation's last-message cache
    pub fn append_message(
        &self,
        conversation_id: &Uuid,
        sender_id: &Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<BotMessage> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let id = Uuid::new_v4();

        tx.execute(
            "INSERT INTO bot_messages (id, conversation_id, sender_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                conversation_id.to_string(),
                sender_id.to_string(),
                content,
                db_time(at),
            ),
        )
        .context("Failed to insert bot message")?;
        tx.execute(
            "UPDATE bot_conversations SET last_message = ?, last_message_at = ? WHERE id = ?",
            (content, db_time(at), conversation_id.to_string()),
        )
        .context("Failed to update conversation cache")?;
        tx.commit().context("Failed to commit bot message")?;

        Ok(BotMessage {
            id,
            conversation_id: *conversation_id,
            sender_id: *sender_id,
            sender_username: String::new(),
            content: content.to_string(),
            created_at: at,
        })
    }

    /// The latest `limit` messages of a conversation, oldest first
    pub fn recent_messages(&self, conversation_id: &Uuid, limit: i64) -> Result<Vec<BotMessage>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT m.id, m.conversation_id, m.sender_id, a.username, m.content, m.created_at
                FROM bot_messages m
                JOIN agents a ON m.sender_id = a.id
                WHERE m.conversation_id = ?
                ORDER BY m.created_at DESC
                LIMIT ?
             ) ORDER BY created_at ASC",
        )?;
        let messages = stmt
            .query_map(rusqlite::params![conversation_id.to_string(), limit], |row| {
                Ok(BotMessage {
                    id: parse_uuid(row.get(0)?, 0)?,
                    conversation_id: parse_uuid(row.get(1)?, 1)?,
                    sender_id: parse_uuid(row.get(2)?, 2)?,
                    sender_username: row.get(3)?,
                    content: row.get(4)?,
                    created_at: parse_time(row.get(5)?, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Post a line into the community room
    pub fn post_community(&self, agent_id: &Uuid, content: &str, at: DateTime<Utc>) -> Result<CommunityMessage> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO community_messages (id, agent_id, content, created_at) VALUES (?, ?, ?, ?)",
            (id.to_string(), agent_id.to_string(), content, db_time(at)),
        )
        .context("Failed to insert community message")?;
        Ok(CommunityMessage {
            id,
            agent_id: *agent_id,
            agent_username: String::new(),
            content: content.to_string(),
            created_at: at,
        })
    }

    /// The latest `limit` community lines, oldest first
    pub fn recent_community(&self, limit: i64) -> Result<Vec<CommunityMessage>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT m.id, m.agent_id, a.username, m.content, m.created_at
                FROM community_messages m
                JOIN agents a ON m.agent_id = a.id
                ORDER BY m.created_at DESC
                LIMIT ?
             ) ORDER BY created_at ASC",
        )?;
        let messages = stmt
            .query_map([limit], |row| {
                Ok(CommunityMessage {
                    id: parse_uuid(row.get(0)?, 0)?,
                    agent_id: parse_uuid(row.get(1)?, 1)?,
                    agent_username: row.get(2)?,
                    content: row.get(3)?,
                    created_at: parse_time(row.get(4)?, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}
