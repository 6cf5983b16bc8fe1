use rusqlite::ffi;

use tweetdb_types::PostRecord;

use crate::db::repositories::{AuthorRepository, HashtagRepository, PostRepository};
use crate::db::DbPool;
use crate::error::PersistError;

/// Destination for posts that passed the inclusion filters
pub trait PostSink {
    /// Store one post together with its author and hashtags
    fn persist(&self, record: &PostRecord) -> Result<(), PersistError>;
}

/// Writes post records to the relational store
///
/// Each call checks one connection out of the pool and performs the author
/// upsert, the post insert and the hashtag inserts inside a single
/// transaction. The connection goes back to the pool on every exit path.
#[derive(Clone)]
pub struct Persister {
    pool: DbPool,
}

impl Persister {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl PostSink for Persister {
    fn persist(&self, record: &PostRecord) -> Result<(), PersistError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let new_author = AuthorRepository::insert_if_absent(&tx, &record.author)?;

        PostRepository::insert(&tx, record).map_err(|e| {
            if is_key_violation(&e) {
                PersistError::DuplicatePost(record.post_id)
            } else {
                PersistError::Store(e)
            }
        })?;

        let tags = HashtagRepository::insert_all(&tx, record.post_id, record.hashtags())?;

        // Dropping `tx` on any early return above rolls the whole post back
        tx.commit()?;

        tracing::debug!(
            post_id = record.post_id,
            author_id = record.author.author_id,
            new_author,
            tags,
            "Stored post"
        );
        Ok(())
    }
}

fn is_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.extended_code,
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tweetdb_types::{Author, PostContent};

    fn setup() -> (Database, Persister) {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let persister = Persister::new(db.pool.clone());
        (db, persister)
    }

    fn record(post_id: i64, author: Author, hashtags: &[&str]) -> PostRecord {
        PostRecord {
            post_id,
            author,
            content: PostContent::Standard {
                text: format!("post {post_id}"),
                hashtags: hashtags.iter().map(|t| t.to_string()).collect(),
            },
            created_at: "2018-10-10T20:19:24Z".parse().unwrap(),
            language: Some("en".to_string()),
            is_retweet: false,
        }
    }

    fn author(name: &str, followers: i64) -> Author {
        Author {
            author_id: 77,
            display_name: name.to_string(),
            follower_count: followers,
        }
    }

    #[test]
    fn test_persist_writes_all_three_tables() {
        let (db, persister) = setup();
        persister
            .persist(&record(1, author("Ada", 10), &["ev", "tesla"]))
            .expect("Failed to persist");

        let authors = AuthorRepository::new(db.pool.clone());
        let posts = PostRepository::new(db.pool.clone());
        let hashtags = HashtagRepository::new(db.pool.clone());

        assert_eq!(authors.get_by_id(77).unwrap(), Some(author("Ada", 10)));
        let stored = posts.get_by_id(1).unwrap().expect("post missing");
        assert_eq!(stored.author_id, 77);
        assert_eq!(stored.text, "post 1");
        assert_eq!(stored.created_at.to_rfc3339(), "2018-10-10T20:19:24+00:00");
        assert_eq!(hashtags.get_by_post(1).unwrap(), vec!["ev", "tesla"]);
    }

    #[test]
    fn test_existing_author_is_left_unchanged() {
        let (db, persister) = setup();
        persister.persist(&record(1, author("Ada", 10), &[])).unwrap();
        persister
            .persist(&record(2, author("Ada Lovelace", 9000), &[]))
            .unwrap();

        let authors = AuthorRepository::new(db.pool.clone());
        assert_eq!(authors.get_by_id(77).unwrap(), Some(author("Ada", 10)));
        assert_eq!(authors.count().unwrap(), 1);
        assert_eq!(PostRepository::new(db.pool.clone()).count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_post_fails_and_rolls_back_hashtags() {
        let (db, persister) = setup();
        persister.persist(&record(5, author("Ada", 10), &["one"])).unwrap();

        let err = persister
            .persist(&record(5, author("Ada", 10), &["two", "three"]))
            .expect_err("duplicate post must fail");
        assert!(matches!(err, PersistError::DuplicatePost(5)));

        let hashtags = HashtagRepository::new(db.pool.clone());
        assert_eq!(hashtags.get_by_post(5).unwrap(), vec!["one"]);
        assert_eq!(hashtags.count().unwrap(), 1);
    }

    #[test]
    fn test_failed_post_does_not_leave_new_author() {
        let (db, persister) = setup();
        persister.persist(&record(5, author("Ada", 10), &[])).unwrap();

        let newcomer = Author {
            author_id: 88,
            display_name: "Grace".to_string(),
            follower_count: 1,
        };
        assert!(persister.persist(&record(5, newcomer, &[])).is_err());

        let authors = AuthorRepository::new(db.pool.clone());
        assert_eq!(authors.get_by_id(88).unwrap(), None);
    }

    #[test]
    fn test_zero_hashtags_writes_no_tag_rows() {
        let (db, persister) = setup();
        persister.persist(&record(9, author("Ada", 1), &[])).unwrap();
        assert_eq!(HashtagRepository::new(db.pool.clone()).count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_tags_are_kept() {
        let (db, persister) = setup();
        persister
            .persist(&record(3, author("Ada", 1), &["Tesla", "tesla", "Tesla"]))
            .unwrap();
        persister.persist(&record(4, author("Ada", 1), &["tesla"])).unwrap();

        let hashtags = HashtagRepository::new(db.pool.clone());
        assert_eq!(hashtags.get_by_post(3).unwrap(), vec!["Tesla", "tesla", "Tesla"]);
        assert_eq!(hashtags.top(5).unwrap(), vec![("tesla".to_string(), 4)]);
    }

    #[test]
    fn test_connection_returned_after_failure() {
        let (db, persister) = setup();
        persister.persist(&record(1, author("Ada", 1), &[])).unwrap();
        assert!(persister.persist(&record(1, author("Ada", 1), &[])).is_err());

        // The in-memory pool holds one connection; this would time out if it leaked
        assert_eq!(db.pool.state().idle_connections, 1);
        persister.persist(&record(2, author("Ada", 1), &[])).unwrap();
    }
}
