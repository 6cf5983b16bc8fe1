//! Error types for the ingestion pipeline.

use std::time::Duration;
use thiserror::Error;

/// A stream event that could not be turned into a post record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

/// Failure to write one post record to the store.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The post id is already stored; posts are never overwritten.
    #[error("Post {0} already exists")]
    DuplicatePost(i64),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Failures of the upstream transport. All of them end the session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Stream rejected the connection with status {code}")]
    Status { code: u16 },

    #[error("I/O error while reading stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream closed by upstream")]
    Closed,

    #[error("Stream disconnected by upstream (code {code}): {reason}")]
    Disconnected { code: i64, reason: String },

    #[error("Missing credential: {0}")]
    MissingCredentials(&'static str),
}

/// Errors that end a session and should end the process.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport failed while tracking {track:?} after {}s: {source}", .elapsed.as_secs())]
    TransportFatal {
        track: Vec<String>,
        elapsed: Duration,
        #[source]
        source: TransportError,
    },
}
