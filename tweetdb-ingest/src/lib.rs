// Library exports for tweetdb-ingest
// This allows other crates in the workspace to use the ingest modules

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod filter;
pub mod session;
pub mod stream;
