use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use tweetdb_types::{PostRecord, StoredPost};

use crate::db::DbPool;

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a post row; there is no conflict clause, a repeated id fails
    pub fn insert(conn: &Connection, record: &PostRecord) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO posts (post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            (
                record.post_id,
                record.author.author_id,
                record.text(),
                record.created_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    /// Get a single post by ID
    pub fn get_by_id(&self, post_id: i64) -> Result<Option<StoredPost>> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                "SELECT post_id, author_id, text, created_at FROM posts WHERE post_id = ?",
                [post_id],
                map_post,
            )
            .optional()?;
        Ok(post)
    }

    /// Get posts by a specific author, newest first
    pub fn get_by_author(&self, author_id: i64) -> Result<Vec<StoredPost>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT post_id, author_id, text, created_at FROM posts
             WHERE author_id = ?
             ORDER BY created_at DESC",
        )?;

        let posts = stmt
            .query_map([author_id], map_post)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read posts for author")?;

        Ok(posts)
    }

    /// Get total number of stored posts
    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<StoredPost> {
    let created_at: String = row.get(3)?;
    let created_at = created_at.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(StoredPost {
        post_id: row.get(0)?,
        author_id: row.get(1)?,
        text: row.get(2)?,
        created_at,
    })
}
