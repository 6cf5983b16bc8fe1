pub mod schema;
pub mod connection;
pub mod repositories;
pub mod persister;

pub use connection::{Database, DbConnection, DbPool};
pub use persister::{Persister, PostSink};
