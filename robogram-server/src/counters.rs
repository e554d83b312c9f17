//! Denormalized counter bookkeeping.
//!
//! Inserts bump counters with in-place SQL increments so concurrent writers
//! cannot lose updates. Drift from older data or manual edits is healed by the
//! reconcile functions, which recompute counters from the join tables.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use robogram_types::ReconcileReport;

use crate::db::repositories::StoryRepository;
use crate::db::Database;

pub(crate) fn increment_like_count(conn: &Connection, post_id: &Uuid) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE posts SET like_count = like_count + 1 WHERE id = ?",
        [post_id.to_string()],
    )
}

pub(crate) fn increment_comment_count(conn: &Connection, post_id: &Uuid) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?",
        [post_id.to_string()],
    )
}

pub(crate) fn increment_follow_counts(
    conn: &Connection,
    follower_id: &Uuid,
    following_id: &Uuid,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE agents SET following_count = following_count + 1 WHERE id = ?",
        [follower_id.to_string()],
    )?;
    conn.execute(
        "UPDATE agents SET follower_count = follower_count + 1 WHERE id = ?",
        [following_id.to_string()],
    )?;
    Ok(())
}

/// Recompute every agent's follower/following counters from the follows table.
/// Returns how many agents had a stale value.
pub fn reconcile_follow_counts(db: &Database) -> Result<usize> {
    let conn = db.connection()?;
    let updated = conn
        .execute(
            "UPDATE agents
             SET follower_count = (SELECT COUNT(*) FROM follows f WHERE f.following_id = agents.id),
                 following_count = (SELECT COUNT(*) FROM follows f WHERE f.follower_id = agents.id)
             WHERE follower_count <> (SELECT COUNT(*) FROM follows f WHERE f.following_id = agents.id)
                OR following_count <> (SELECT COUNT(*) FROM follows f WHERE f.follower_id = agents.id)",
            [],
        )
        .context("Failed to reconcile follow counts")?;
    Ok(updated)
}

/// Recompute like/comment counters on every post. Returns how many posts changed.
pub fn reconcile_post_counts(db: &Database) -> Result<usize> {
    let conn = db.connection()?;
    let updated = conn
        .execute(
            "UPDATE posts
             SET like_count = (SELECT COUNT(*) FROM likes l WHERE l.post_id = posts.id),
                 comment_count = (SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id)
             WHERE like_count <> (SELECT COUNT(*) FROM likes l WHERE l.post_id = posts.id)
                OR comment_count <> (SELECT COUNT(*) FROM comments c WHERE c.post_id = posts.id)",
            [],
        )
        .context("Failed to reconcile post counts")?;
    Ok(updated)
}

/// Run both reconciliations
pub fn reconcile_all(db: &Database) -> Result<ReconcileReport> {
    let agents_updated = reconcile_follow_counts(db)?;
    let posts_updated = reconcile_post_counts(db)?;
    tracing::info!(
        "Counter reconciliation: {} agents and {} posts corrected",
        agents_updated,
        posts_updated
    );
    Ok(ReconcileReport {
        agents_updated,
        posts_updated,
    })
}

/// Physically delete stories that expired at or before `now`.
/// Reads already hide them; this only reclaims rows.
pub fn cleanup_expired_stories(db: &Database, now: DateTime<Utc>) -> Result<usize> {
    let removed = StoryRepository::new(db.pool.clone()).delete_expired(now)?;
    if removed > 0 {
        tracing::info!("Removed {} expired stories", removed);
    }
    Ok(removed)
}
