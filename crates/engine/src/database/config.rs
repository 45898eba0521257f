//! Store configuration via `jsondb.toml`
//!
//! Declared secondary indexes and the insert batch threshold are fixed for
//! the lifetime of a [`JsonDb`](super::JsonDb). They can be built in code or
//! read from a TOML file.

use jsondb_core::record::IndexSet;
use jsondb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name conventionally placed next to the database file.
pub const CONFIG_FILE_NAME: &str = "jsondb.toml";

/// Default number of path+value bytes buffered before an insert batch is
/// flushed (512 KiB).
pub const DEFAULT_BATCH_FLUSH_BYTES: usize = 512 * 1024;

/// One declared secondary index: `field` of every direct child of
/// `container`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Container path in caller form (`/users`)
    pub container: String,
    /// Field name inside each child of the container
    pub field: String,
}

/// Store configuration loaded from `jsondb.toml`.
///
/// # Example
///
/// ```toml
/// batch_flush_bytes = 524288
///
/// [[indexes]]
/// container = "/users"
/// field = "email"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonDbConfig {
    /// Declared secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
    /// Insert batch threshold in bytes.
    #[serde(default = "default_batch_flush_bytes")]
    pub batch_flush_bytes: usize,
}

fn default_batch_flush_bytes() -> usize {
    DEFAULT_BATCH_FLUSH_BYTES
}

impl Default for JsonDbConfig {
    fn default() -> Self {
        Self {
            indexes: Vec::new(),
            batch_flush_bytes: DEFAULT_BATCH_FLUSH_BYTES,
        }
    }
}

impl JsonDbConfig {
    /// Config with no indexes and the default batch threshold
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an index on `field` of every child of `container`
    pub fn with_index(mut self, container: impl Into<String>, field: impl Into<String>) -> Self {
        self.indexes.push(IndexConfig {
            container: container.into(),
            field: field.into(),
        });
        self
    }

    /// Set the insert batch threshold
    pub fn with_batch_flush_bytes(mut self, bytes: usize) -> Self {
        self.batch_flush_bytes = bytes;
        self
    }

    /// Normalized index declarations.
    ///
    /// # Errors
    ///
    /// Returns an error if a container path or field name is not a valid key.
    pub fn index_set(&self) -> Result<IndexSet> {
        IndexSet::from_pairs(self.indexes.iter().map(|i| (&i.container, &i.field)))
    }

    /// Check the config without opening anything.
    pub fn validate(&self) -> Result<()> {
        if self.batch_flush_bytes == 0 {
            return Err(Error::Config(
                "batch_flush_bytes must be greater than zero".to_string(),
            ));
        }
        self.index_set().map(|_| ())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# JsonDB configuration
#
# Bytes of path and value data buffered before an insert batch is flushed
# (default: 524288, i.e. 512 KiB).
batch_flush_bytes = 524288

# Secondary indexes: one entry per (container, field) pair.
# fetch_ids_by_property_value on a declared pair uses the index,
# other pairs fall back to a full scan.
# [[indexes]]
# container = "/users"
# field = "email"
"#
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: JsonDbConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
