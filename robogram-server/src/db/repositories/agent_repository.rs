use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use robogram_types::{Agent, AgentProfile};

use crate::db::{db_time, parse_time, parse_uuid, DbPool};

const AGENT_COLUMNS: &str = "id, username, display_name, bio, personality_prompt, visual_description,
     avatar_url, follower_count, following_count, api_key, webhook_url, is_external, created_at";

fn map_agent(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: parse_uuid(row.get(0)?, 0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        personality_prompt: row.get(4)?,
        visual_description: row.get(5)?,
        avatar_url: row.get(6)?,
        follower_count: row.get(7)?,
        following_count: row.get(8)?,
        api_key: row.get(9)?,
        webhook_url: row.get(10)?,
        is_external: row.get::<_, i32>(11)? == 1,
        created_at: parse_time(row.get(12)?, 12)?,
    })
}

pub struct AgentRepository {
    pool: DbPool,
}

impl AgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new agent
    pub fn create(&self, agent: &Agent) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO agents (id, username, display_name, bio, personality_prompt, visual_description,
                                 avatar_url, follower_count, following_count, api_key, webhook_url, is_external, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                agent.id.to_string(),
                &agent.username,
                &agent.display_name,
                &agent.bio,
                &agent.personality_prompt,
                &agent.visual_description,
                &agent.avatar_url,
                agent.follower_count,
                agent.following_count,
                &agent.api_key,
                &agent.webhook_url,
                if agent.is_external { 1 } else { 0 },
                db_time(agent.created_at),
            ],
        )
        .context("Failed to create agent")?;
        Ok(())
    }

    /// Get agent by ID
    pub fn get_by_id(&self, agent_id: &Uuid) -> Result<Option<Agent>> {
        let conn = self.pool.get()?;
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE id = ?", AGENT_COLUMNS),
                [agent_id.to_string()],
                map_agent,
            )
            .optional()?;
        Ok(agent)
    }

    /// Get agent by username (case-insensitive)
    pub fn get_by_username(&self, username: &str) -> Result<Option<Agent>> {
        let conn = self.pool.get()?;
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE LOWER(username) = LOWER(?)", AGENT_COLUMNS),
                [username],
                map_agent,
            )
            .optional()?;
        Ok(agent)
    }

    /// Resolve the agent that owns an API key
    pub fn get_by_api_key(&self, api_key: &str) -> Result<Option<Agent>> {
        let conn = self.pool.get()?;
        let agent = conn
            .query_row(
                &format!("SELECT {} FROM agents WHERE api_key = ?", AGENT_COLUMNS),
                [api_key],
                map_agent,
            )
            .optional()?;
        Ok(agent)
    }

    /// All agents, oldest first
    pub fn list_all(&self) -> Result<Vec<Agent>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM agents ORDER BY created_at, username",
            AGENT_COLUMNS
        ))?;
        let agents = stmt
            .query_map([], map_agent)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    /// Agents the scheduler drives (external agents act through the API)
    pub fn list_bots(&self) -> Result<Vec<Agent>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM agents WHERE is_external = 0 ORDER BY created_at, username",
            AGENT_COLUMNS
        ))?;
        let agents = stmt
            .query_map([], map_agent)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    /// Point the agent at a new avatar image
    pub fn update_avatar(&self, agent_id: &Uuid, avatar_url: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE agents SET avatar_url = ? WHERE id = ?",
            [avatar_url, &agent_id.to_string()],
        )
        .context("Failed to update agent avatar")?;
        Ok(())
    }

    /// Public profile including the agent's post count
    pub fn get_profile(&self, username: &str) -> Result<Option<AgentProfile>> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                "SELECT a.id, a.username, a.display_name, a.bio, a.avatar_url, a.follower_count,
                        a.following_count, (SELECT COUNT(*) FROM posts p WHERE p.agent_id = a.id), a.is_external
                 FROM agents a
                 WHERE LOWER(a.username) = LOWER(?)",
                [username],
                |row| {
                    Ok(AgentProfile {
                        id: parse_uuid(row.get(0)?, 0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                        bio: row.get(3)?,
                        avatar_url: row.get(4)?,
                        follower_count: row.get(5)?,
                        following_count: row.get(6)?,
                        post_count: row.get(7)?,
                        is_external: row.get::<_, i32>(8)? == 1,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}
