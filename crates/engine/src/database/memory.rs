//! Private in-memory store
//!
//! Each [`InMemoryJsonDb`] gets its own named database on SQLite's `memdb`
//! VFS. Connections to it take ordinary file locks, so concurrent writers
//! wait on the busy timeout instead of failing with table locks. One
//! connection is held open for the lifetime of the store so the data survives
//! between operations; closing it discards everything.

use super::{JsonDb, JsonDbConfig};
use crate::connection::{ConnectionSource, SqliteUri};
use crate::events::{EventBus, NoopEventBus};
use jsondb_core::Result;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Store backed by a uniquely named in-memory database
///
/// Dereferences to [`JsonDb`], so every store operation is available.
pub struct InMemoryJsonDb {
    db: JsonDb,
    uri: String,
    keep_alive: Mutex<Option<Connection>>,
}

impl InMemoryJsonDb {
    /// Empty store with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(JsonDbConfig::default())
    }

    /// Empty store with `config`
    pub fn with_config(config: JsonDbConfig) -> Result<Self> {
        Self::open(config, Arc::new(NoopEventBus))
    }

    /// Empty store with `config`, broadcasting to `events`
    pub fn open(config: JsonDbConfig, events: Arc<dyn EventBus>) -> Result<Self> {
        let uri = format!("file:/jsondb-{}?vfs=memdb", Uuid::new_v4());
        let source = SqliteUri::new(uri.clone());
        let keep_alive = source.connect()?;
        let db = JsonDb::builder()
            .source(source)
            .config(config)
            .event_bus(events)
            .open()?;
        info!(target: "jsondb::db", uri = %uri, "In-memory store opened");
        Ok(InMemoryJsonDb {
            db,
            uri,
            keep_alive: Mutex::new(Some(keep_alive)),
        })
    }

    /// URI of the backing database
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.keep_alive.lock().is_none()
    }

    /// Release the backing database. Safe to call more than once.
    pub fn close(&self) {
        if let Some(conn) = self.keep_alive.lock().take() {
            if let Err((_, e)) = conn.close() {
                warn!(target: "jsondb::db", uri = %self.uri, error = %e, "Close failed");
            }
            info!(target: "jsondb::db", uri = %self.uri, "In-memory store closed");
        }
    }
}

impl Deref for InMemoryJsonDb {
    type Target = JsonDb;

    fn deref(&self) -> &JsonDb {
        &self.db
    }
}

impl Drop for InMemoryJsonDb {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for InMemoryJsonDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryJsonDb")
            .field("uri", &self.uri)
            .field("closed", &self.is_closed())
            .finish()
    }
}
