//! Connection sources and per-connection setup
//!
//! The store never keeps a connection between calls: every operation asks
//! its [`ConnectionSource`] for a fresh one. Pooling, if any, lives behind
//! the trait.

use crate::dialect::Dialect;
use jsondb_core::Result;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Supplier of database connections
pub trait ConnectionSource: Send + Sync {
    /// Open (or check out) a connection
    fn connect(&self) -> Result<Connection>;

    /// Product name used for dialect detection
    fn product_name(&self) -> String {
        "SQLite".to_string()
    }

    /// Product version used for dialect detection
    fn product_version(&self) -> String {
        rusqlite::version().to_string()
    }
}

/// SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteFile {
    path: PathBuf,
}

impl SqliteFile {
    /// Source opening `path`, creating the file if needed
    pub fn new(path: impl AsRef<Path>) -> Self {
        SqliteFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionSource for SqliteFile {
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::default())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

/// SQLite database addressed by URI (`file:/name?vfs=memdb`)
#[derive(Debug, Clone)]
pub struct SqliteUri {
    uri: String,
}

impl SqliteUri {
    /// Source opening `uri`
    pub fn new(uri: impl Into<String>) -> Self {
        SqliteUri { uri: uri.into() }
    }

    /// The URI
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl ConnectionSource for SqliteUri {
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.uri,
            OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

/// Make a fresh connection usable by the store
///
/// `LIKE` is switched to case-sensitive matching (paths are compared
/// byte-wise) and, where the dialect needs them, the helper functions are
/// registered.
pub fn prepare_connection(conn: &Connection, dialect: Dialect) -> Result<()> {
    if dialect == Dialect::SQLite {
        conn.pragma_update(None, "case_sensitive_like", true)?;
    }
    if dialect.needs_helper_functions() {
        register_helper_functions(conn)?;
    }
    Ok(())
}

/// Register `split_part(text, delimiter, n)` and `trim_suffix(text, suffix)`
///
/// `split_part` follows PostgreSQL: fields are numbered from 1 and an
/// out-of-range field is the empty string. `trim_suffix` removes one
/// occurrence of `suffix` from the end, if present. Both return NULL on NULL
/// input.
pub fn register_helper_functions(conn: &Connection) -> Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("split_part", 3, flags, |ctx| {
        let text: Option<String> = ctx.get(0)?;
        let delimiter: Option<String> = ctx.get(1)?;
        let n: Option<i64> = ctx.get(2)?;
        Ok(match (text, delimiter, n) {
            (Some(text), Some(delimiter), Some(n)) => Some(split_part(&text, &delimiter, n)),
            _ => None,
        })
    })?;

    conn.create_scalar_function("trim_suffix", 2, flags, |ctx| {
        let text: Option<String> = ctx.get(0)?;
        let suffix: Option<String> = ctx.get(1)?;
        Ok(match (text, suffix) {
            (Some(text), Some(suffix)) => Some(match text.strip_suffix(suffix.as_str()) {
                Some(trimmed) => trimmed.to_string(),
                None => text,
            }),
            _ => None,
        })
    })?;

    Ok(())
}

fn split_part(text: &str, delimiter: &str, n: i64) -> String {
    if n < 1 {
        return String::new();
    }
    if delimiter.is_empty() {
        return if n == 1 { text.to_string() } else { String::new() };
    }
    text.split(delimiter)
        .nth((n - 1) as usize)
        .unwrap_or_default()
        .to_string()
}
