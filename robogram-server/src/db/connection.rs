use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

use super::schema::{SCHEMA, SEED_PERSONAS};

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// Every in-memory connection is its own database, so the memory pool is
    /// capped at a single connection.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (manager, is_memory) = Self::create_connection_manager(path);
        let manager = manager.with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.busy_timeout(Duration::from_secs(5))
        });

        let mut builder = Pool::builder();
        if is_memory {
            builder = builder.max_size(1);
        }
        let pool = builder
            .build(manager)
            .context("Failed to create database connection pool")?;
        Ok(Self { pool })
    }

    /// Create appropriate connection manager based on path
    ///
    /// # Arguments
    /// * `path` - Database file path or ":memory:" for in-memory database
    fn create_connection_manager<P: AsRef<Path>>(path: P) -> (SqliteConnectionManager, bool) {
        let path_str = path.as_ref().to_string_lossy();
        let trimmed_path = path_str.trim();

        if trimmed_path.eq_ignore_ascii_case(MEMORY_DB_PATH) {
            (SqliteConnectionManager::memory(), true)
        } else {
            (SqliteConnectionManager::file(path), false)
        }
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Insert the built-in personas (existing usernames are left alone)
    pub fn seed_personas(&self) -> Result<usize> {
        let conn = self.connection()?;
        let before: i64 = conn.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
        conn.execute_batch(SEED_PERSONAS)
            .context("Failed to seed personas")?;
        let after: i64 = conn.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
        Ok((after - before) as usize)
    }

    /// Remove every row from every table. Used by the reseed command.
    pub fn reset(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "DELETE FROM bot_messages;
             DELETE FROM bot_conversations;
             DELETE FROM community_messages;
             DELETE FROM stories;
             DELETE FROM comments;
             DELETE FROM likes;
             DELETE FROM follows;
             DELETE FROM posts;
             DELETE FROM agents;",
        )
        .context("Failed to reset database")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("Failed to get connection");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .expect("Failed to prepare statement");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("Failed to query tables")
            .collect::<Result<Vec<_>, _>>()
            .expect("Failed to collect tables");

        for table in [
            "agents",
            "posts",
            "comments",
            "likes",
            "follows",
            "stories",
            "community_messages",
            "bot_conversations",
            "bot_messages",
            "app_settings",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_seed_personas_is_repeatable() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        assert_eq!(db.seed_personas().expect("Failed to seed"), 8);
        assert_eq!(db.seed_personas().expect("Failed to reseed"), 0);
    }

    #[test]
    fn test_reset_clears_agents() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_personas().expect("Failed to seed");
        db.reset().expect("Failed to reset");

        let conn = db.connection().expect("Failed to get connection");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))
            .expect("Failed to count agents");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_memory_database_detection() {
        let memory_paths = [":memory:", " :memory: ", ":MEMORY:", " :Memory: "];

        for path in &memory_paths {
            let db = Database::new(path).expect("Failed to create memory database");
            db.initialize().expect("Failed to initialize schema");
        }

        let temp_path = std::env::temp_dir().join(format!("robogram-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(&temp_path).expect("Failed to create file database");
        db.initialize().expect("Failed to initialize file schema");
        drop(db);

        let _ = std::fs::remove_file(temp_path);
    }
}
