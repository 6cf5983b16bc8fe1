use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use super::schema::{SCHEMA, TABLES};

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

/// Upper bound on pooled connections for a file-backed store
const FILE_POOL_SIZE: u32 = 4;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (manager, max_size) = Self::create_connection_manager(path);
        let manager = manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .context("Failed to create database connection pool")?;
        Ok(Self { pool })
    }

    /// Create appropriate connection manager based on path
    ///
    /// Every in-memory connection is its own database, so the in-memory pool
    /// holds exactly one connection.
    fn create_connection_manager<P: AsRef<Path>>(path: P) -> (SqliteConnectionManager, u32) {
        let path_str = path.as_ref().to_string_lossy();
        let trimmed_path = path_str.trim();

        if trimmed_path.eq_ignore_ascii_case(MEMORY_DB_PATH) {
            (SqliteConnectionManager::memory(), 1)
        } else {
            (SqliteConnectionManager::file(path), FILE_POOL_SIZE)
        }
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    ///
    /// Safe to run against an existing store; tables are only created when missing.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        tracing::debug!("Schema ensured");
        Ok(())
    }

    /// Names of the expected tables that do not exist in the store
    pub fn missing_tables(&self) -> Result<Vec<&'static str>> {
        let conn = self.connection()?;
        let mut missing = Vec::new();
        for table in TABLES {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |row| row.get::<_, i32>(0).map(|count| count > 0),
                )
                .with_context(|| format!("Failed to check for {} table", table))?;
            if !exists {
                missing.push(table);
            }
        }
        Ok(missing)
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}
