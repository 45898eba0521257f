//! Relational engine for the JsonDB document store
//!
//! This crate maps JSON documents onto a single SQL table of leaf records:
//! - Database: [`JsonDb`] with set/update/delete/push/get and property lookup
//! - Transactions: one per operation, or a global one via a closure
//! - Dialects: SQL text for SQLite, PostgreSQL, CockroachDB and H2
//! - Events: change notification after commit
//!
//! Only SQLite connections are executed in-process (through `rusqlite`); the
//! other dialects are covered at the SQL-text level.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod database;
pub mod dialect;
pub mod events;
pub mod keygen;
pub mod query;
mod resolve;
mod session;
mod stream;

pub use connection::{ConnectionSource, SqliteFile, SqliteUri};
pub use database::{
    IndexConfig, InMemoryJsonDb, JsonDb, JsonDbBuilder, JsonDbConfig, TransactionScope,
    CONFIG_FILE_NAME, DEFAULT_BATCH_FLUSH_BYTES,
};
pub use dialect::Dialect;
pub use events::{CollectingEventBus, EventBus, NoopEventBus, EVENT_DELETED, EVENT_UPDATED};
pub use keygen::{create_key, PushKeyGenerator};
pub use query::SqlQuery;
pub use stream::JsonStream;
