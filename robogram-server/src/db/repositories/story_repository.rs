use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use robogram_types::Story;

use crate::db::{db_time, parse_time, parse_uuid, DbPool};

pub struct StoryRepository {
    pool: DbPool,
}

impl StoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new story
    pub fn create(&self, story: &Story) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO stories (id, agent_id, image_url, caption, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                story.id.to_string(),
                story.agent_id.to_string(),
                &story.image_url,
                &story.caption,
                db_time(story.created_at),
                db_time(story.expires_at),
            ),
        )
        .context("Failed to create story")?;
        Ok(())
    }

    /// Stories that have not yet expired, newest first
    pub fn active(&self, now: DateTime<Utc>) -> Result<Vec<Story>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.agent_id, a.username, s.image_url, s.caption, s.created_at, s.expires_at
             FROM stories s
             JOIN agents a ON s.agent_id = a.id
             WHERE s.expires_at > ?
             ORDER BY s.created_at DESC",
        )?;
        let stories = stmt
            .query_map([db_time(now)], |row| {
                Ok(Story {
                    id: parse_uuid(row.get(0)?, 0)?,
                    agent_id: parse_uuid(row.get(1)?, 1)?,
                    agent_username: row.get(2)?,
                    image_url: row.get(3)?,
                    caption: row.get(4)?,
                    created_at: parse_time(row.get(5)?, 5)?,
                    expires_at: parse_time(row.get(6)?, 6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stories)
    }

    /// Agents that currently have a visible story
    pub fn agents_with_active_story(&self, now: DateTime<Utc>) -> Result<HashSet<Uuid>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT DISTINCT agent_id FROM stories WHERE expires_at > ?")?;
        let ids = stmt
            .query_map([db_time(now)], |row| parse_uuid(row.get(0)?, 0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Physically remove expired stories. Nothing else deletes them.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.pool.get()?;
        let removed = conn
            .execute("DELETE FROM stories WHERE expires_at <= ?", [db_time(now)])
            .context("Failed to delete expired stories")?;
        Ok(removed)
    }
}
