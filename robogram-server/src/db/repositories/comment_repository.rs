use anyhow::{Context, Result};
use rusqlite::Row;
use uuid::Uuid;

use robogram_types::Comment;

use crate::counters;
use crate::db::{db_time, parse_time, parse_uuid, DbPool};

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: parse_uuid(row.get(0)?, 0)?,
        post_id: parse_uuid(row.get(1)?, 1)?,
        agent_id: parse_uuid(row.get(2)?, 2)?,
        agent_username: row.get(3)?,
        content: row.get(4)?,
        created_at: parse_time(row.get(5)?, 5)?,
    })
}

pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a comment and bump the post's comment counter
    pub fn create(&self, comment: &Comment) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO comments (id, post_id, agent_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
            (
                comment.id.to_string(),
                comment.post_id.to_string(),
                comment.agent_id.to_string(),
                &comment.content,
                db_time(comment.created_at),
            ),
        )
        .context("Failed to create comment")?;
        counters::increment_comment_count(&tx, &comment.post_id)
            .context("Failed to bump comment count")?;
        tx.commit().context("Failed to commit comment")?;
        Ok(())
    }

    /// Comments on a post, oldest first
    pub fn list_for_post(&self, post_id: &Uuid) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.agent_id, a.username, c.content, c.created_at
             FROM comments c
             JOIN agents a ON c.agent_id = a.id
             WHERE c.post_id = ?
             ORDER BY c.created_at ASC",
        )?;
        let comments = stmt
            .query_map([post_id.to_string()], map_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    /// The latest `limit` comments on a post, oldest first
    pub fn recent_for_post(&self, post_id: &Uuid, limit: i64) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT c.id, c.post_id, c.agent_id, a.username, c.content, c.created_at
                FROM comments c
                JOIN agents a ON c.agent_id = a.id
                WHERE c.post_id = ?
                ORDER BY c.created_at DESC
                LIMIT ?
             ) ORDER BY created_at ASC",
        )?;
        let comments = stmt
            .query_map(rusqlite::params![post_id.to_string(), limit], map_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{AgentRepository, PostRepository};
    use crate::db::Database;
    use chrono::{Duration, Utc};
    use robogram_types::Post;

    #[test]
    fn test_comments_are_ordered_and_counted() {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_personas().expect("Failed to seed personas");
        let ids: Vec<Uuid> = AgentRepository::new(db.pool.clone())
            .list_bots()
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();

        let posts = PostRepository::new(db.pool.clone());
        let post = Post {
            id: Uuid::new_v4(),
            agent_id: ids[0],
            agent_username: String::new(),
            image_url: "https://cdn/p.png".to_string(),
            caption: "morning run".to_string(),
            like_count: 0,
            comment_count: 0,
            scheduled_for: None,
            is_published: true,
            created_at: Utc::now(),
        };
        posts.create(&post).unwrap();

        let repo = CommentRepository::new(db.pool.clone());
        let start = Utc::now();
        for (i, text) in ["first!", "so good", "wow"].iter().enumerate() {
            repo.create(&Comment {
                id: Uuid::new_v4(),
                post_id: post.id,
                agent_id: ids[i + 1],
                agent_username: String::new(),
                content: text.to_string(),
                created_at: start + Duration::seconds(i as i64),
            })
            .unwrap();
        }

        let all = repo.list_for_post(&post.id).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content, "first!");
        assert!(!all[0].agent_username.is_empty());

        let recent = repo.recent_for_post(&post.id, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "so good");
        assert_eq!(recent[1].content, "wow");

        assert_eq!(posts.get_by_id(&post.id).unwrap().unwrap().comment_count, 3);
    }
}
