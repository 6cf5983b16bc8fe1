use anyhow::Result;
use rusqlite::Connection;

use crate::db::DbPool;

pub struct HashtagRepository {
    pool: DbPool,
}

impl HashtagRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store one row per hashtag occurrence for a post
    pub fn insert_all(conn: &Connection, post_id: i64, hashtags: &[String]) -> rusqlite::Result<usize> {
        let mut stmt = conn.prepare_cached("INSERT INTO post_hashtags (post_id, tag) VALUES (?1, ?2)")?;
        for hashtag in hashtags {
            stmt.execute((post_id, hashtag))?;
        }
        Ok(hashtags.len())
    }

    /// Get hashtags for a post in insertion order
    pub fn get_by_post(&self, post_id: i64) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT tag FROM post_hashtags WHERE post_id = ? ORDER BY id")?;

        let hashtags = stmt
            .query_map([post_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hashtags)
    }

    /// Get the most frequent hashtags (case-insensitive) with their counts
    pub fn top(&self, limit: usize) -> Result<Vec<(String, i64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT LOWER(tag) AS name, COUNT(*) AS uses
             FROM post_hashtags
             GROUP BY name
             ORDER BY uses DESC, name ASC
             LIMIT ?",
        )?;

        let hashtags = stmt
            .query_map([limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hashtags)
    }

    /// Get total number of hashtag rows
    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM post_hashtags", [], |row| row.get(0))?;
        Ok(count)
    }
}
