//! Store builder for fluent configuration

use std::path::Path;
use std::sync::Arc;

use jsondb_core::{Error, Result};

use super::config::JsonDbConfig;
use super::JsonDb;
use crate::connection::{ConnectionSource, SqliteFile};
use crate::events::{EventBus, NoopEventBus};

/// Builder for [`JsonDb`]
///
/// ```ignore
/// use jsondb_engine::{JsonDb, JsonDbConfig};
///
/// // 1. SQLite file, settings from jsondb.toml beside it
/// let db = JsonDb::open("/data/store.db")?;
///
/// // 2. Declared indexes and an event bus
/// let db = JsonDb::builder()
///     .path("/data/store.db")
///     .index("/users", "email")
///     .event_bus(bus)
///     .open()?;
///
/// // 3. Settings from a file
/// let db = JsonDb::builder()
///     .path("/data/store.db")
///     .config(JsonDbConfig::from_file("/data/jsondb.toml".as_ref())?)
///     .open()?;
/// ```
pub struct JsonDbBuilder {
    source: Option<Arc<dyn ConnectionSource>>,
    config: JsonDbConfig,
    events: Arc<dyn EventBus>,
    create_tables: bool,
}

impl JsonDbBuilder {
    /// Builder with default config, no event bus and schema creation on
    pub fn new() -> Self {
        Self {
            source: None,
            config: JsonDbConfig::default(),
            events: Arc::new(NoopEventBus),
            create_tables: true,
        }
    }

    /// Use a SQLite database file
    pub fn path(self, path: impl AsRef<Path>) -> Self {
        self.source(SqliteFile::new(path))
    }

    /// Use any connection source
    pub fn source(mut self, source: impl ConnectionSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Use an already shared connection source
    pub fn shared_source(mut self, source: Arc<dyn ConnectionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the whole config
    pub fn config(mut self, config: JsonDbConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare one secondary index
    pub fn index(mut self, container: impl Into<String>, field: impl Into<String>) -> Self {
        self.config = self.config.with_index(container, field);
        self
    }

    /// Set the insert batch threshold
    pub fn batch_flush_bytes(mut self, bytes: usize) -> Self {
        self.config.batch_flush_bytes = bytes;
        self
    }

    /// Receive change events
    pub fn event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Whether `open` creates missing tables (default: true)
    pub fn create_tables(mut self, create: bool) -> Self {
        self.create_tables = create;
        self
    }

    /// Open the store
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No source was configured (use `.path()` or `.source()`)
    /// - The config is invalid
    /// - The product is not a supported dialect
    /// - Schema creation fails
    pub fn open(self) -> Result<JsonDb> {
        let source = self.source.ok_or_else(|| {
            Error::invalid_input("JsonDbBuilder::open() requires a path or a connection source")
        })?;
        let db = JsonDb::from_parts(source, self.config, self.events)?;
        if self.create_tables {
            db.create_tables()?;
        }
        Ok(db)
    }
}

impl Default for JsonDbBuilder {
    fn default() -> Self {
        Self::new()
    }
}
