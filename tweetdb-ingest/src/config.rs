use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::filter::DEFAULT_LANGUAGE;

/// Default stream endpoint (statuses/filter)
pub const DEFAULT_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

/// Default session length: 5.5 hours
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 19_800;

#[derive(Debug, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Stream {
    pub endpoint: String,
    pub track: Vec<String>,
    pub language: String,
    pub time_limit_secs: u64,
}

impl Stream {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

/// Upstream credentials; only ever read from settings files or the environment
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: Database,
    pub stream: Stream,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_env(|key| std::env::var(key).ok())
    }

    /// Build settings, reading environment overrides through `env`
    pub fn with_env<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional)
        let config_file_name = "settings.toml";

        // Check in current directory
        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in tweetdb-ingest directory (for development)
        let dev_path = PathBuf::from("tweetdb-ingest").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = builder
            .set_default("database.path", "tweetdb.db")?
            .set_default("stream.endpoint", DEFAULT_ENDPOINT)?
            .set_default("stream.track", vec!["tesla"])?
            .set_default("stream.language", DEFAULT_LANGUAGE)?
            .set_default("stream.time_limit_secs", DEFAULT_TIME_LIMIT_SECS)?;

        // 2. Override with environment variables (highest priority)
        if let Some(db_path) = env("DATABASE_PATH") {
            builder = builder.set_override("database.path", db_path)?;
        }
        if let Some(endpoint) = env("STREAM_ENDPOINT") {
            builder = builder.set_override("stream.endpoint", endpoint)?;
        }
        if let Some(track) = env("STREAM_TRACK") {
            builder = builder.set_override("stream.track", split_keywords(&track))?;
        }
        if let Some(language) = env("STREAM_LANGUAGE") {
            builder = builder.set_override("stream.language", language)?;
        }
        if let Some(limit) = env("STREAM_TIME_LIMIT_SECS") {
            builder = builder.set_override("stream.time_limit_secs", limit)?;
        }
        if let Some(token) = env("STREAM_BEARER_TOKEN") {
            builder = builder.set_override("credentials.bearer_token", token)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }
}

/// Split a comma-separated keyword list, dropping empty entries
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}
