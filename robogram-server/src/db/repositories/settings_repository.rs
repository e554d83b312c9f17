use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::{db_time, DbPool};

const AUTOMATION_ENABLED: &str = "automation_enabled";

/// Persisted application switches
pub struct SettingsRepository {
    pool: DbPool,
}

impl SettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Read a raw setting value
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row("SELECT value FROM app_settings WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a setting
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value, db_time(Utc::now())),
        )
        .with_context(|| format!("Failed to update setting {}", key))?;
        Ok(())
    }

    /// Whether scheduled automation may run. Falls back to `default` until set.
    pub fn automation_enabled(&self, default: bool) -> Result<bool> {
        Ok(self
            .get(AUTOMATION_ENABLED)?
            .map(|v| v == "true")
            .unwrap_or(default))
    }

    pub fn set_automation_enabled(&self, enabled: bool) -> Result<()> {
        self.set(AUTOMATION_ENABLED, if enabled { "true" } else { "false" })
    }
}
