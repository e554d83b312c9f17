use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

use robogram_types::Post;

use crate::db::{db_time, parse_opt_time, parse_time, parse_uuid, DbPool};

const POST_SELECT: &str = "SELECT p.id, p.agent_id, a.username, p.image_url, p.caption, p.like_count,
            p.comment_count, p.scheduled_for, p.is_published, p.created_at
     FROM posts p
     JOIN agents a ON p.agent_id = a.id";

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: parse_uuid(row.get(0)?, 0)?,
        agent_id: parse_uuid(row.get(1)?, 1)?,
        agent_username: row.get(2)?,
        image_url: row.get(3)?,
        caption: row.get(4)?,
        like_count: row.get(5)?,
        comment_count: row.get(6)?,
        scheduled_for: parse_opt_time(row.get(7)?, 7)?,
        is_published: row.get::<_, i32>(8)? == 1,
        created_at: parse_time(row.get(9)?, 9)?,
    })
}

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new post
    pub fn create(&self, post: &Post) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (id, agent_id, image_url, caption, like_count, comment_count, scheduled_for, is_published, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                post.id.to_string(),
                post.agent_id.to_string(),
                &post.image_url,
                &post.caption,
                post.like_count,
                post.comment_count,
                post.scheduled_for.map(db_time),
                if post.is_published { 1 } else { 0 },
                db_time(post.created_at),
            ],
        )
        .context("Failed to create post")?;
        Ok(())
    }

    /// Get a single post by ID
    pub fn get_by_id(&self, post_id: &Uuid) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!("{} WHERE p.id = ?", POST_SELECT),
                [post_id.to_string()],
                map_post,
            )
            .optional()?;
        Ok(post)
    }

    /// Published posts, newest first, optionally restricted to one agent
    pub fn feed(&self, limit: i64, offset: i64, agent_id: Option<&Uuid>) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        let posts = match agent_id {
            Some(agent_id) => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE p.is_published = 1 AND p.agent_id = ?
                     ORDER BY p.created_at DESC LIMIT ? OFFSET ?",
                    POST_SELECT
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![agent_id.to_string(), limit, offset], map_post)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE p.is_published = 1 ORDER BY p.created_at DESC LIMIT ? OFFSET ?",
                    POST_SELECT
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![limit, offset], map_post)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(posts)
    }

    /// Most recent published posts, the pool interaction targets are drawn from
    pub fn recent(&self, limit: i64) -> Result<Vec<Post>> {
        self.feed(limit, 0, None)
    }

    /// Latest post timestamp for every agent that has posted
    pub fn latest_post_times(&self) -> Result<HashMap<Uuid, DateTime<Utc>>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT agent_id, MAX(created_at) FROM posts GROUP BY agent_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((parse_uuid(row.get(0)?, 0)?, parse_time(row.get(1)?, 1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Publish queued posts whose time has come, dating each at its scheduled time
    pub fn publish_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.pool.get()?;
        let published = conn
            .execute(
                "UPDATE posts SET is_published = 1, created_at = scheduled_for
                 WHERE is_published = 0 AND scheduled_for IS NOT NULL AND scheduled_for <= ?",
                [db_time(now)],
            )
            .context("Failed to publish scheduled posts")?;
        Ok(published)
    }

    /// Get post count for an agent
    pub fn count_by_agent(&self, agent_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE agent_id = ?",
            [agent_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
