/// SQL schema for the tweetdb store
/// Creates all tables with primary keys, foreign keys, and indexes
pub const SCHEMA: &str = r#"
-- Authors table (one row per account, first sighting wins)
CREATE TABLE IF NOT EXISTS authors (
    author_id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL,
    follower_count INTEGER NOT NULL DEFAULT 0
);

-- Posts table (append-only)
CREATE TABLE IF NOT EXISTS posts (
    post_id INTEGER PRIMARY KEY,
    author_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (author_id) REFERENCES authors(author_id)
);

-- Create index on author_id for per-author lookups
CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id);

-- Hashtag rows, one per tag occurrence; duplicates are allowed
CREATE TABLE IF NOT EXISTS post_hashtags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    tag TEXT NOT NULL,
    FOREIGN KEY (post_id) REFERENCES posts(post_id)
);

-- Create index on post_id for efficient hashtag lookups
CREATE INDEX IF NOT EXISTS idx_post_hashtags_post_id ON post_hashtags(post_id);
"#;

/// Names of the tables created by [`SCHEMA`], in dependency order
pub const TABLES: [&str; 3] = ["authors", "posts", "post_hashtags"];
