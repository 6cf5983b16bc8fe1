use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tweetdb_ingest::db::repositories::{AuthorRepository, HashtagRepository, PostRepository};
use tweetdb_ingest::db::schema::TABLES;
use tweetdb_ingest::db::Database;

/// tweetdb store utility
///
/// Creates the tables the ingester writes to and reports what is stored.
#[derive(Parser, Debug)]
#[command(name = "tweetdb-migrate")]
#[command(about = "Set up and inspect the tweetdb store", long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value = "./tweetdb.db", global = true)]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the authors, posts and post_hashtags tables if missing
    Init,
    /// Show row counts and the most used hashtags
    Stats {
        /// Number of hashtags to list
        #[arg(short, long, default_value_t = 10)]
        top: usize,
    },
}

/// Row counts collected from the store
#[derive(Debug, Default, PartialEq, Eq)]
struct StoreStats {
    authors: i64,
    posts: i64,
    hashtags: i64,
    top_hashtags: Vec<(String, i64)>,
}

/// Create the schema in the given store
fn init_database(db: &Database) -> Result<()> {
    db.initialize()?;
    let missing = db.missing_tables()?;
    if !missing.is_empty() {
        anyhow::bail!("Schema setup incomplete, missing tables: {}", missing.join(", "));
    }
    Ok(())
}

/// Open an existing store and validate its schema
fn connect_database(path: &str) -> Result<Database> {
    println!("Connecting to database: {}", path);

    if !std::path::Path::new(path).exists() {
        anyhow::bail!("Database file not found: {} (run `tweetdb-migrate init` first)", path);
    }

    let db = Database::new(path).context("Failed to open database connection")?;

    let missing = db.missing_tables()?;
    if !missing.is_empty() {
        anyhow::bail!(
            "Database schema is invalid - missing tables: {}",
            missing.join(", ")
        );
    }

    println!("Database connection successful - schema validated");
    Ok(db)
}

fn collect_stats(db: &Database, top: usize) -> Result<StoreStats> {
    Ok(StoreStats {
        authors: AuthorRepository::new(db.pool.clone()).count()?,
        posts: PostRepository::new(db.pool.clone()).count()?,
        hashtags: HashtagRepository::new(db.pool.clone()).count()?,
        top_hashtags: HashtagRepository::new(db.pool.clone()).top(top)?,
    })
}

/// Display store statistics in a formatted way
fn display_stats(stats: &StoreStats) {
    println!();
    println!("Store Summary");
    println!("=============");
    println!();
    println!("Authors: {}", stats.authors);
    println!("Posts: {}", stats.posts);
    println!("Hashtag rows: {}", stats.hashtags);

    if !stats.top_hashtags.is_empty() {
        println!();
        println!("Top hashtags:");
        for (i, (tag, uses)) in stats.top_hashtags.iter().enumerate() {
            println!("  {}. #{} ({})", i + 1, tag, uses);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Init => {
            println!("Initializing schema in {}", args.database);
            let db = Database::new(&args.database).context("Failed to open database")?;
            init_database(&db)?;
            println!("Tables ready: {}", TABLES.join(", "));
        }
        Command::Stats { top } => {
            let db = connect_database(&args.database)?;
            let stats = collect_stats(&db, top)?;
            display_stats(&stats);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_all_tables() {
        let db = Database::in_memory().expect("Failed to create in-memory database");
        assert_eq!(db.missing_tables().unwrap().len(), TABLES.len());

        init_database(&db).expect("Failed to initialize");
        assert!(db.missing_tables().unwrap().is_empty());

        // Running again leaves the store usable
        init_database(&db).expect("Second init failed");
    }

    #[test]
    fn test_collect_stats() {
        let db = Database::in_memory().expect("Failed to create in-memory database");
        init_database(&db).unwrap();

        let conn = db.connection().unwrap();
        conn.execute_batch(
            "INSERT INTO authors (author_id, display_name, follower_count) VALUES (1, 'a', 5);
             INSERT INTO posts (post_id, author_id, text, created_at) VALUES (10, 1, 'x', '2020-01-01T00:00:00+00:00');
             INSERT INTO posts (post_id, author_id, text, created_at) VALUES (11, 1, 'y', '2020-01-01T00:00:00+00:00');
             INSERT INTO post_hashtags (post_id, tag) VALUES (10, 'Tesla');
             INSERT INTO post_hashtags (post_id, tag) VALUES (11, 'tesla');
             INSERT INTO post_hashtags (post_id, tag) VALUES (11, 'ev');",
        )
        .expect("Failed to seed store");
        drop(conn);

        let stats = collect_stats(&db, 1).unwrap();
        assert_eq!(
            stats,
            StoreStats {
                authors: 1,
                posts: 2,
                hashtags: 3,
                top_hashtags: vec![("tesla".to_string(), 2)],
            }
        );
    }

    #[test]
    fn test_connect_requires_existing_file() {
        let path = std::env::temp_dir().join("tweetdb_migrate_missing.db");
        let _ = std::fs::remove_file(&path);
        assert!(connect_database(path.to_str().unwrap()).is_err());
    }
}
