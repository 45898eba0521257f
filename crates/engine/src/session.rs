//! Store operations over one borrowed connection
//!
//! A `Session` is the body of every operation: [`JsonDb`](crate::JsonDb)
//! wraps one in its own transaction, a
//! [`TransactionScope`](crate::TransactionScope) shares one across calls.
//! Events are collected here and delivered by whoever commits.

use crate::database::Shared;
use crate::events::{PendingEvent, EVENT_DELETED, EVENT_UPDATED};
use crate::keygen;
use crate::query::{self, SqlQuery};
use crate::resolve::{self, ContainerKind};
use crate::stream;
use jsondb_core::flatten::Flattener;
use jsondb_core::key::{self, SEPARATOR};
use jsondb_core::options::GetOptions;
use jsondb_core::record::{encode_scalar, IndexSet, LeafRecord};
use jsondb_core::token::{JsonTokenReader, Token};
use jsondb_core::{Error, Result};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use tracing::{debug, warn};

pub(crate) struct Session<'a> {
    conn: &'a Connection,
    shared: &'a Shared,
    events: Vec<PendingEvent>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(conn: &'a Connection, shared: &'a Shared) -> Self {
        Session {
            conn,
            shared,
            events: Vec::new(),
        }
    }

    /// Events produced so far, in operation order
    pub(crate) fn into_events(self) -> Vec<PendingEvent> {
        self.events
    }

    /// Stored form of a caller path, resolved against this session's view
    pub(crate) fn resolve(&self, path: &str) -> Result<String> {
        resolve::resolve_path(self.conn, path)
    }

    pub(crate) fn exists(&self, db_path: &str) -> Result<bool> {
        let q = query::count_below(db_path);
        let count: i64 = self
            .conn
            .query_row(&q.sql, params_from_iter(q.params.iter()), |r| r.get(0))?;
        Ok(count > 0)
    }

    pub(crate) fn set<R: Read>(&mut self, db_path: &str, json: R) -> Result<()> {
        let mut tokens = JsonTokenReader::new(json);
        self.set_value(db_path, &mut tokens)?;
        tokens.finish()?;
        self.announce(EVENT_UPDATED, db_path)
    }

    /// Apply each top-level field of a JSON object as its own `set`
    ///
    /// All-digit field names patch array positions when an array is stored
    /// at `db_path` and are object fields otherwise.
    pub(crate) fn update<R: Read>(&mut self, db_path: &str, json: R) -> Result<()> {
        let mut tokens = JsonTokenReader::new(json);
        if tokens.next_token()? != Some(Token::StartObject) {
            return Err(Error::invalid_input("update requires a JSON object"));
        }
        let positions = resolve::container_kind(self.conn, db_path)? == Some(ContainerKind::Array);
        loop {
            match tokens.next_token()? {
                Some(Token::FieldName(name)) => {
                    let child = format!("{}{}", db_path, key::child_token(&name, positions)?);
                    self.set_value(&child, &mut tokens)?;
                    self.announce(EVENT_UPDATED, &child)?;
                }
                Some(Token::EndObject) => break,
                _ => return Err(Error::parse(tokens.offset(), "malformed object")),
            }
        }
        tokens.finish()
    }

    pub(crate) fn delete(&mut self, db_path: &str) -> Result<bool> {
        let removed = self.delete_rows(db_path)?;
        debug!(target: "jsondb::query", path = %db_path, rows = removed, "Deleted subtree");
        if removed > 0 {
            self.announce(EVENT_DELETED, db_path)?;
        }
        Ok(removed > 0)
    }

    pub(crate) fn push<R: Read>(&mut self, db_path: &str, json: R) -> Result<String> {
        let key = keygen::create_key();
        let child = key::child_path(db_path, &key)?;
        self.set(&child, json)?;
        Ok(key)
    }

    pub(crate) fn write_subtree<W: Write>(
        &self,
        db_path: &str,
        options: &GetOptions,
        out: W,
    ) -> Result<Option<W>> {
        options.validate()?;
        let q = resolve::subtree_query(self.conn, db_path, options)?;
        if !stream::has_rows(self.conn, &q)? {
            return Ok(None);
        }
        stream::write_rows(self.conn, &q, db_path, options, out).map(Some)
    }

    pub(crate) fn fetch_ids_by_property_value(
        &self,
        container: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<BTreeSet<String>> {
        key::validate_path(container)?;
        key::validate_key(field)?;
        let db_container = self.resolve(container)?;
        let encoded = encode_scalar(value)?;

        let mut ids = BTreeSet::new();
        if self.shared.indexes.contains(&db_container, field) {
            let index_key = IndexSet::index_key(&db_container, field);
            let suffix = format!("{}{}{}", SEPARATOR, field, SEPARATOR);
            for path in self.strings(&query::index_lookup(&index_key, &encoded))? {
                let entity = path
                    .strip_prefix(db_container.as_str())
                    .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                    .ok_or_else(|| {
                        Error::corruption(format!("'{}' does not belong to index '{}'", path, index_key))
                    })?;
                ids.insert(key::token_to_user(entity)?);
            }
            debug!(target: "jsondb::index", index = %index_key, hits = ids.len(), "Index lookup");
        } else {
            warn!(
                target: "jsondb::index",
                container = %container,
                field = %field,
                "No index declared for property lookup, scanning"
            );
            let q = query::scan_lookup(self.shared.dialect, &db_container, field, &encoded)?;
            for entity in self.strings(&q)? {
                ids.insert(key::token_to_user(&entity)?);
            }
        }
        Ok(ids)
    }

    /// Replace the subtree at `db_path` with the next value of `tokens`
    fn set_value<R: Read>(&mut self, db_path: &str, tokens: &mut JsonTokenReader<R>) -> Result<()> {
        let removed = self.delete_rows(db_path)?;
        let mut batch = InsertBatch::new(
            self.conn,
            self.shared.dialect.upsert_sql(),
            self.shared.config.batch_flush_bytes,
        );
        let written = Flattener::new(&self.shared.indexes)
            .flatten_value(tokens, db_path, |record| batch.push(record))?;
        batch.flush()?;
        debug!(
            target: "jsondb::query",
            path = %db_path,
            removed,
            written,
            "Replaced subtree"
        );
        Ok(())
    }

    /// Delete the subtree at `db_path` and any value stored at one of its
    /// ancestors
    fn delete_rows(&self, db_path: &str) -> Result<usize> {
        let mut removed = self.execute(&query::delete_below(db_path))?;
        if let Some(q) = query::delete_exact(&key::ancestors(db_path)) {
            removed += self.execute(&q)?;
        }
        Ok(removed)
    }

    fn announce(&mut self, event: &'static str, db_path: &str) -> Result<()> {
        self.events.push(PendingEvent {
            event,
            path: key::to_user_path(db_path)?,
        });
        Ok(())
    }

    fn execute(&self, q: &SqlQuery) -> Result<usize> {
        Ok(self.conn.execute(&q.sql, params_from_iter(q.params.iter()))?)
    }

    fn strings(&self, q: &SqlQuery) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&q.sql)?;
        let rows = stmt.query_map(params_from_iter(q.params.iter()), |row| row.get(0))?;
        let values = rows.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
    }
}

/// Buffered inserts, flushed once the buffered bytes exceed the threshold
struct InsertBatch<'c> {
    conn: &'c Connection,
    sql: String,
    pending: Vec<LeafRecord>,
    bytes: usize,
    limit: usize,
}

impl<'c> InsertBatch<'c> {
    fn new(conn: &'c Connection, sql: String, limit: usize) -> Self {
        InsertBatch {
            conn,
            sql,
            pending: Vec::new(),
            bytes: 0,
            limit,
        }
    }

    fn push(&mut self, record: LeafRecord) -> Result<()> {
        self.bytes += record.size_bytes();
        self.pending.push(record);
        if self.bytes > self.limit {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut stmt = self.conn.prepare_cached(&self.sql)?;
        for record in &self.pending {
            stmt.execute(params![
                record.path(),
                record.value(),
                record.ovalue(),
                record.index()
            ])?;
        }
        debug!(
            target: "jsondb::query",
            rows = self.pending.len(),
            bytes = self.bytes,
            "Flushed insert batch"
        );
        self.pending.clear();
        self.bytes = 0;
        Ok(())
    }
}
