//! Deferred JSON results
//!
//! A [`JsonStream`] owns the connection and the statement of a `get`. Nothing
//! is read until it is written somewhere; rows then flow straight from the
//! cursor into a [`JsonReconstructor`], and the connection is released when
//! the stream is consumed or dropped.

use crate::query::SqlQuery;
use jsondb_core::options::GetOptions;
use jsondb_core::reconstruct::{Flow, JsonReconstructor, ReconstructOptions};
use jsondb_core::{Error, Result};
use rusqlite::{params_from_iter, Connection};
use serde_json::ser::Formatter;
use std::io::Write;
use tracing::debug;

/// JSON value of a subtree, produced on demand
pub struct JsonStream {
    conn: Connection,
    query: SqlQuery,
    base: String,
    options: GetOptions,
}

impl JsonStream {
    pub(crate) fn new(conn: Connection, query: SqlQuery, base: String, options: GetOptions) -> Self {
        JsonStream {
            conn,
            query,
            base,
            options,
        }
    }

    /// Stored path of the subtree
    pub fn base_path(&self) -> &str {
        &self.base
    }

    /// Write the JSON to `out` and hand `out` back
    pub fn write_to<W: Write>(self, out: W) -> Result<W> {
        write_rows(&self.conn, &self.query, &self.base, &self.options, out)
    }

    /// Collect the JSON as bytes
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.write_to(Vec::new())
    }

    /// Collect the JSON as a string
    pub fn into_string(self) -> Result<String> {
        let bytes = self.into_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::corruption(e.to_string()))
    }
}

impl std::fmt::Debug for JsonStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStream")
            .field("base", &self.base)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Whether `query` yields at least one row
pub(crate) fn has_rows(conn: &Connection, query: &SqlQuery) -> Result<bool> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let found = rows.next()?.is_some();
    Ok(found)
}

/// Run `query` (selecting `path, value, ovalue`) and write its rows as JSON
pub(crate) fn write_rows<W: Write>(
    conn: &Connection,
    query: &SqlQuery,
    base: &str,
    options: &GetOptions,
    out: W,
) -> Result<W> {
    let shaping = ReconstructOptions::from(options);
    if options.pretty_print {
        pump(conn, query, JsonReconstructor::pretty(out, base, shaping)?)
    } else {
        pump(conn, query, JsonReconstructor::compact(out, base, shaping)?)
    }
}

fn pump<W: Write, F: Formatter>(
    conn: &Connection,
    query: &SqlQuery,
    mut reconstructor: JsonReconstructor<W, F>,
) -> Result<W> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let mut count = 0usize;
    while let Some(row) = rows.next()? {
        let path: String = row.get(0)?;
        let value: String = row.get(1)?;
        let ovalue: Option<String> = row.get(2)?;
        count += 1;
        if reconstructor.write_row(&path, &value, ovalue.as_deref())? == Flow::Stop {
            break;
        }
    }
    debug!(target: "jsondb::query", rows = count, "Streamed subtree");
    let out = reconstructor.finish()?;
    Ok(out)
}
