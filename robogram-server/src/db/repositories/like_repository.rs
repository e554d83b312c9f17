use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

use crate::counters;
use crate::db::{db_time, is_unique_violation, parse_uuid, DbPool, InsertOutcome};

pub struct LikeRepository {
    pool: DbPool,
}

impl LikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Like a post. The (post, agent) primary key rejects repeats, which is
    /// reported as `AlreadyExists` without touching the counter.
    pub fn like(&self, post_id: &Uuid, agent_id: &Uuid) -> Result<InsertOutcome> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO likes (post_id, agent_id, created_at) VALUES (?, ?, ?)",
            (post_id.to_string(), agent_id.to_string(), db_time(Utc::now())),
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(InsertOutcome::AlreadyExists),
            Err(e) => return Err(e).context("Failed to insert like"),
        }

        counters::increment_like_count(&tx, post_id).context("Failed to bump like count")?;
        tx.commit().context("Failed to commit like")?;
        Ok(InsertOutcome::Inserted)
    }

    /// Existing (post, agent) pairs for the given posts
    pub fn pairs_for_posts(&self, post_ids: &[Uuid]) -> Result<HashSet<(Uuid, Uuid)>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let conn = self.pool.get()?;
        let placeholders = vec!["?"; post_ids.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT post_id, agent_id FROM likes WHERE post_id IN ({})",
            placeholders
        ))?;
        let pairs = stmt
            .query_map(
                rusqlite::params_from_iter(post_ids.iter().map(|id| id.to_string())),
                |row| Ok((parse_uuid(row.get(0)?, 0)?, parse_uuid(row.get(1)?, 1)?)),
            )?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(pairs)
    }
}
