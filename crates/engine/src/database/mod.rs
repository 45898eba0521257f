//! The store engine
//!
//! [`JsonDb`] maps JSON documents onto the leaf-record table and back. It
//! holds only immutable state (connection source, dialect, declared indexes,
//! config, event bus) behind an `Arc`, so clones are cheap and it is
//! `Send + Sync`.
//!
//! ## Transactions
//!
//! Every mutation runs in its own transaction on a fresh connection:
//! begin, body, commit, then broadcast events. Any failure rolls back and is
//! returned unchanged. [`JsonDb::with_global_transaction`] instead runs many
//! operations on one transaction through a [`TransactionScope`].
//!
//! ## Paths
//!
//! Paths are given in caller form (`/users/alice`, `a/c/0`). Empty segments
//! are ignored and every segment must be a valid key. An all-digit segment
//! names a field when the stored container is an object and an array
//! position otherwise. Invalid paths fail before any SQL is issued.

pub mod config;
mod builder;
mod memory;
mod transactions;

pub use builder::JsonDbBuilder;
pub use config::{IndexConfig, JsonDbConfig, CONFIG_FILE_NAME, DEFAULT_BATCH_FLUSH_BYTES};
pub use memory::InMemoryJsonDb;
pub use transactions::TransactionScope;

use crate::connection::{prepare_connection, ConnectionSource};
use crate::dialect::Dialect;
use crate::events::{self, EventBus};
use crate::keygen;
use crate::resolve;
use crate::session::Session;
use crate::stream::{self, JsonStream};
use jsondb_core::key::validate_path;
use jsondb_core::options::GetOptions;
use jsondb_core::record::IndexSet;
use jsondb_core::{Error, Result};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable engine state shared by all handles and sessions
pub(crate) struct Shared {
    pub(crate) source: Arc<dyn ConnectionSource>,
    pub(crate) dialect: Dialect,
    pub(crate) indexes: IndexSet,
    pub(crate) config: JsonDbConfig,
    pub(crate) events: Arc<dyn EventBus>,
}

impl Shared {
    /// Fresh connection, ready for store statements
    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = self.source.connect()?;
        prepare_connection(&conn, self.dialect)?;
        Ok(conn)
    }
}

/// Path-addressed JSON document store
#[derive(Clone)]
pub struct JsonDb {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for JsonDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDb")
            .field("dialect", &self.shared.dialect)
            .field("indexes", &self.shared.indexes.len())
            .field("batch_flush_bytes", &self.shared.config.batch_flush_bytes)
            .finish()
    }
}

impl JsonDb {
    /// Builder for custom sources, indexes and event buses
    pub fn builder() -> JsonDbBuilder {
        JsonDbBuilder::new()
    }

    /// Open (creating if needed) a SQLite file
    ///
    /// Settings come from `jsondb.toml` in the same directory, which is
    /// written with defaults if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_path = path
            .parent()
            .map_or_else(|| PathBuf::from(CONFIG_FILE_NAME), |dir| dir.join(CONFIG_FILE_NAME));
        JsonDbConfig::write_default_if_missing(&config_path)?;
        let config = JsonDbConfig::from_file(&config_path)?;
        JsonDbBuilder::new().path(path).config(config).open()
    }

    pub(crate) fn from_parts(
        source: Arc<dyn ConnectionSource>,
        config: JsonDbConfig,
        events: Arc<dyn EventBus>,
    ) -> Result<Self> {
        config.validate()?;
        let indexes = config.index_set()?;
        let dialect = Dialect::detect(&source.product_name(), &source.product_version())?;
        info!(
            target: "jsondb::db",
            dialect = %dialect,
            indexes = indexes.len(),
            "Store opened"
        );
        Ok(JsonDb {
            shared: Arc::new(Shared {
                source,
                dialect,
                indexes,
                config,
                events,
            }),
        })
    }

    /// Detected SQL dialect
    pub fn dialect(&self) -> Dialect {
        self.shared.dialect
    }

    /// Declared secondary indexes
    pub fn indexes(&self) -> &IndexSet {
        &self.shared.indexes
    }

    /// Effective configuration
    pub fn config(&self) -> &JsonDbConfig {
        &self.shared.config
    }

    /// Create the table and its indexes if missing
    pub fn create_tables(&self) -> Result<()> {
        self.run_ddl(self.shared.dialect.create_table_sql())
    }

    /// Remove the table and everything in it
    pub fn drop_tables(&self) -> Result<()> {
        self.run_ddl(self.shared.dialect.drop_table_sql())
    }

    /// Whether anything is stored at or below `path`
    pub fn exists(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        self.read(|session| session.exists(&session.resolve(path)?))
    }

    /// Replace the value at `path` with the JSON read from `json`
    ///
    /// Everything below `path` and any scalar stored at one of its ancestors
    /// is removed first.
    pub fn set<R: Read>(&self, path: &str, json: R) -> Result<()> {
        validate_path(path)?;
        self.write("set", path, |session| {
            let db_path = session.resolve(path)?;
            session.set(&db_path, json)
        })
    }

    /// [`set`](Self::set) from an in-memory value
    pub fn set_value(&self, path: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = to_json_bytes(value)?;
        self.set(path, bytes.as_slice())
    }

    /// Set each top-level field of the JSON object read from `json` below
    /// `path`, leaving other fields untouched
    pub fn update<R: Read>(&self, path: &str, json: R) -> Result<()> {
        validate_path(path)?;
        self.write("update", path, |session| {
            let db_path = session.resolve(path)?;
            session.update(&db_path, json)
        })
    }

    /// [`update`](Self::update) from an in-memory value
    pub fn update_value(&self, path: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = to_json_bytes(value)?;
        self.update(path, bytes.as_slice())
    }

    /// Remove the value at `path`; returns whether anything was removed
    pub fn delete(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        self.write("delete", path, |session| {
            let db_path = session.resolve(path)?;
            session.delete(&db_path)
        })
    }

    /// Store the JSON under a new time-ordered key below `path` and return
    /// the key
    pub fn push<R: Read>(&self, path: &str, json: R) -> Result<String> {
        validate_path(path)?;
        self.write("push", path, |session| {
            let db_path = session.resolve(path)?;
            session.push(&db_path, json)
        })
    }

    /// [`push`](Self::push) from an in-memory value
    pub fn push_value(&self, path: &str, value: &serde_json::Value) -> Result<String> {
        let bytes = to_json_bytes(value)?;
        self.push(path, bytes.as_slice())
    }

    /// The value at `path` as a deferred stream, or `None` if nothing is
    /// stored there (after filtering and bounds)
    pub fn get(&self, path: &str, options: &GetOptions) -> Result<Option<JsonStream>> {
        options.validate()?;
        validate_path(path)?;
        let conn = self.shared.connect()?;
        let db_path = resolve::resolve_path(&conn, path)?;
        let q = resolve::subtree_query(&conn, &db_path, options)?;
        if !stream::has_rows(&conn, &q)? {
            debug!(target: "jsondb::query", path = %db_path, "Nothing stored");
            return Ok(None);
        }
        Ok(Some(JsonStream::new(conn, q, db_path, options.clone())))
    }

    /// [`get`](Self::get), collected into a string
    pub fn get_as_string(&self, path: &str, options: &GetOptions) -> Result<Option<String>> {
        self.get(path, options)?
            .map(JsonStream::into_string)
            .transpose()
    }

    /// [`get`](Self::get), collected into bytes
    pub fn get_as_bytes(&self, path: &str, options: &GetOptions) -> Result<Option<Vec<u8>>> {
        self.get(path, options)?
            .map(JsonStream::into_bytes)
            .transpose()
    }

    /// [`get`](Self::get), parsed into a `serde_json::Value`
    pub fn get_value(&self, path: &str, options: &GetOptions) -> Result<Option<serde_json::Value>> {
        match self.get_as_bytes(path, options)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::corruption(format!("stored JSON does not parse: {}", e))),
            None => Ok(None),
        }
    }

    /// Keys of the direct children of `container` whose `field` equals
    /// `value`
    ///
    /// Uses the secondary index when `(container, field)` is declared and a
    /// full scan otherwise.
    pub fn fetch_ids_by_property_value(
        &self,
        container: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<BTreeSet<String>> {
        self.read(|session| session.fetch_ids_by_property_value(container, field, value))
    }

    /// A new time-ordered unique key
    pub fn create_key() -> String {
        keygen::create_key()
    }

    fn run_ddl(&self, statements: Vec<String>) -> Result<()> {
        let mut conn = self.shared.connect()?;
        let tx = conn.transaction()?;
        for sql in &statements {
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        info!(target: "jsondb::db", statements = statements.len(), "Schema updated");
        Ok(())
    }

    fn read<T>(&self, body: impl FnOnce(&Session<'_>) -> Result<T>) -> Result<T> {
        let conn = self.shared.connect()?;
        let session = Session::new(&conn, &self.shared);
        body(&session)
    }

    /// Run `body` in its own transaction; events go out after commit
    fn write<T>(
        &self,
        op: &'static str,
        path: &str,
        body: impl FnOnce(&mut Session<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.shared.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        debug!(target: "jsondb::txn", op, path = %path, "Transaction started");

        let mut session = Session::new(&tx, &self.shared);
        match body(&mut session) {
            Ok(value) => {
                let events = session.into_events();
                tx.commit()?;
                debug!(target: "jsondb::txn", op, "Transaction committed");
                events::deliver(self.shared.events.as_ref(), events);
                Ok(value)
            }
            Err(e) => {
                drop(session);
                warn!(target: "jsondb::txn", op, error = %e, "Transaction rolled back");
                if let Err(rollback) = tx.rollback() {
                    warn!(target: "jsondb::txn", op, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

fn to_json_bytes(value: &serde_json::Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::invalid_input(e.to_string()))
}
