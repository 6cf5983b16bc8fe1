use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tweetdb_ingest::config::Settings;
use tweetdb_ingest::db::{Database, Persister};
use tweetdb_ingest::error::TransportError;
use tweetdb_ingest::filter::FilterPolicy;
use tweetdb_ingest::session::SessionController;
use tweetdb_ingest::stream::{FrameSource, HttpStreamSource, ReplaySource, Stream};

/// Stream posts matching the track keywords into the tweetdb store
///
/// Settings come from settings.toml and the environment; flags given here
/// take precedence.
#[derive(Parser, Debug)]
#[command(name = "tweetdb-ingest")]
#[command(about = "Ingest a filtered post stream into SQLite", long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long)]
    database: Option<String>,

    /// Track keyword (repeat for several)
    #[arg(short, long = "track")]
    track: Vec<String>,

    /// Language a post must declare to be stored
    #[arg(short, long)]
    language: Option<String>,

    /// Session time limit in seconds
    #[arg(long = "time-limit")]
    time_limit_secs: Option<u64>,

    /// Replay a JSONL capture instead of connecting upstream
    #[arg(long)]
    replay: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tweetdb_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::new().context("Failed to load settings")?;

    let default_limit = settings.stream.time_limit();
    let database_path = args.database.unwrap_or(settings.database.path);
    let track = if args.track.is_empty() {
        settings.stream.track
    } else {
        args.track
    };
    let language = args.language.unwrap_or(settings.stream.language);
    let time_limit = args
        .time_limit_secs
        .map(Duration::from_secs)
        .unwrap_or(default_limit);

    let db = open_store(&database_path)?;
    tracing::info!("Database opened at {}", database_path);

    let mut controller = SessionController::new(
        Persister::new(db.pool.clone()),
        FilterPolicy::new(language),
        time_limit,
    );

    match args.replay {
        Some(path) => {
            let source = ReplaySource::open(&path)
                .with_context(|| format!("Failed to open replay file {}", path.display()))?;
            run(source, track, &mut controller)
        }
        None => {
            let token = settings
                .credentials
                .bearer_token
                .ok_or(TransportError::MissingCredentials("bearer_token"))?;
            let source = HttpStreamSource::new(settings.stream.endpoint, token)?;
            tracing::info!("Streaming from {}", source.endpoint());
            run(source, track, &mut controller)
        }
    }
}

/// Open the store and check that its tables exist
fn open_store(path: &str) -> Result<Database> {
    let db = Database::new(path).with_context(|| format!("Failed to open database at {}", path))?;
    let missing = db.missing_tables()?;
    if !missing.is_empty() {
        anyhow::bail!(
            "Database at {} is missing tables: {} (run `tweetdb-migrate init --database {}` first)",
            path,
            missing.join(", "),
            path
        );
    }
    Ok(db)
}

fn run<F: FrameSource>(
    source: F,
    track: Vec<String>,
    controller: &mut SessionController<Persister>,
) -> Result<()> {
    let mut stream = Stream::new(source, track);
    let reason = controller.run(&mut stream)?;

    let stats = controller.stats();
    println!(
        "Session stopped ({}): {} received, {} stored, {} filtered, {} malformed, {} failed writes",
        reason.as_str(),
        stats.received,
        stats.persisted,
        stats.rejected_retweet + stats.rejected_language,
        stats.malformed,
        stats.persist_failures,
    );
    Ok(())
}
