//! SQL dialect strategies
//!
//! The dialect is detected once from the database product name and version
//! string. It supplies the DDL, the upsert statement and the full-scan
//! property lookup, and reports what the backend can do natively.

use jsondb_core::{Error, Result};

/// Name of the table holding all leaf records
pub const TABLE_NAME: &str = "jsondb";

/// Supported relational backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL
    PostgreSQL,
    /// H2
    H2,
    /// SQLite (bundled through `rusqlite`)
    SQLite,
    /// CockroachDB (reports itself as PostgreSQL)
    CockroachDB,
}

impl Dialect {
    /// Pick the dialect for a product name and version string
    ///
    /// CockroachDB answers with PostgreSQL's product name, so the version
    /// string decides between the two.
    ///
    /// ```
    /// use jsondb_engine::Dialect;
    ///
    /// assert_eq!(Dialect::detect("SQLite", "3.45.0").unwrap(), Dialect::SQLite);
    /// assert_eq!(
    ///     Dialect::detect("PostgreSQL", "CockroachDB CCL v23.1.0").unwrap(),
    ///     Dialect::CockroachDB
    /// );
    /// ```
    pub fn detect(product_name: &str, version: &str) -> Result<Self> {
        let product = product_name.to_ascii_lowercase();
        if product.contains("postgres") {
            if version.contains("CockroachDB") {
                Ok(Dialect::CockroachDB)
            } else {
                Ok(Dialect::PostgreSQL)
            }
        } else if product.contains("cockroach") {
            Ok(Dialect::CockroachDB)
        } else if product == "h2" || product.starts_with("h2 ") {
            Ok(Dialect::H2)
        } else if product.contains("sqlite") {
            Ok(Dialect::SQLite)
        } else {
            Err(Error::unsupported(format!(
                "database product '{}' ({})",
                product_name, version
            )))
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::PostgreSQL => "PostgreSQL",
            Dialect::H2 => "H2",
            Dialect::SQLite => "SQLite",
            Dialect::CockroachDB => "CockroachDB",
        }
    }

    /// Regular expressions are available in SQL
    pub fn has_native_regex(&self) -> bool {
        !matches!(self, Dialect::SQLite)
    }

    /// `split_part`/`trim_suffix` must be registered on every connection
    pub fn needs_helper_functions(&self) -> bool {
        matches!(self, Dialect::SQLite)
    }

    /// `CREATE INDEX ... WHERE` is accepted
    pub fn supports_partial_index(&self) -> bool {
        !matches!(self, Dialect::H2)
    }

    /// Statements creating the table and its indexes
    pub fn create_table_sql(&self) -> Vec<String> {
        let text = match self {
            Dialect::PostgreSQL => "VARCHAR COLLATE \"C\"",
            Dialect::CockroachDB => "STRING COLLATE \"C\"",
            Dialect::H2 => "VARCHAR",
            Dialect::SQLite => "TEXT",
        };
        let idx_filter = if self.supports_partial_index() {
            " WHERE idx IS NOT NULL"
        } else {
            ""
        };
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {t} (path {text} PRIMARY KEY, value {text}, ovalue {text}, idx {text})",
                t = TABLE_NAME,
                text = text
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {t}_idx ON {t} (idx, value){f}",
                t = TABLE_NAME,
                f = idx_filter
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {t}_path_desc ON {t} (path DESC)",
                t = TABLE_NAME
            ),
        ]
    }

    /// Statements removing the table (indexes go with it)
    pub fn drop_table_sql(&self) -> Vec<String> {
        vec![format!("DROP TABLE IF EXISTS {}", TABLE_NAME)]
    }

    /// Insert of one record; a repeated path replaces the earlier row
    pub fn upsert_sql(&self) -> String {
        match self {
            Dialect::SQLite => format!(
                "INSERT OR REPLACE INTO {} (path, value, ovalue, idx) VALUES (?, ?, ?, ?)",
                TABLE_NAME
            ),
            Dialect::PostgreSQL | Dialect::CockroachDB => format!(
                "INSERT INTO {} (path, value, ovalue, idx) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (path) DO UPDATE SET value = EXCLUDED.value, \
                 ovalue = EXCLUDED.ovalue, idx = EXCLUDED.idx",
                TABLE_NAME
            ),
            Dialect::H2 => format!(
                "MERGE INTO {} (path, value, ovalue, idx) KEY (path) VALUES (?, ?, ?, ?)",
                TABLE_NAME
            ),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
