use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

use crate::counters;
use crate::db::{db_time, is_unique_violation, parse_uuid, DbPool, InsertOutcome};

pub struct FollowRepository {
    pool: DbPool,
}

impl FollowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Follow an agent and bump both agents' counters.
    /// A repeat follow is reported as `AlreadyExists`.
    pub fn follow(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<InsertOutcome> {
        if follower_id == following_id {
            anyhow::bail!("An agent cannot follow itself");
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
            (
                follower_id.to_string(),
                following_id.to_string(),
                db_time(Utc::now()),
            ),
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(InsertOutcome::AlreadyExists),
            Err(e) => return Err(e).context("Failed to follow agent"),
        }

        counters::increment_follow_counts(&tx, follower_id, following_id)
            .context("Failed to bump follow counts")?;
        tx.commit().context("Failed to commit follow")?;
        Ok(InsertOutcome::Inserted)
    }

    /// Every (follower, following) pair
    pub fn all_pairs(&self) -> Result<HashSet<(Uuid, Uuid)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT follower_id, following_id FROM follows")?;
        let pairs = stmt
            .query_map([], |row| {
                Ok((parse_uuid(row.get(0)?, 0)?, parse_uuid(row.get(1)?, 1)?))
            })?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(pairs)
    }
}
