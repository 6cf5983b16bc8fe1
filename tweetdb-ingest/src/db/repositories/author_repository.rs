use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use tweetdb_types::Author;

use crate::db::DbPool;

pub struct AuthorRepository {
    pool: DbPool,
}

impl AuthorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert an author unless one with the same id is already stored
    ///
    /// Returns whether a row was written. An existing row keeps its name and
    /// follower count.
    pub fn insert_if_absent(conn: &Connection, author: &Author) -> rusqlite::Result<bool> {
        let inserted = conn.execute(
            "INSERT INTO authors (author_id, display_name, follower_count)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(author_id) DO NOTHING",
            (author.author_id, &author.display_name, author.follower_count),
        )?;
        Ok(inserted > 0)
    }

    /// Get author by ID
    pub fn get_by_id(&self, author_id: i64) -> Result<Option<Author>> {
        let conn = self.pool.get()?;
        let author = conn
            .query_row(
                "SELECT author_id, display_name, follower_count FROM authors WHERE author_id = ?",
                [author_id],
                |row| {
                    Ok(Author {
                        author_id: row.get(0)?,
                        display_name: row.get(1)?,
                        follower_count: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(author)
    }

    /// Get total number of stored authors
    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))?;
        Ok(count)
    }
}
