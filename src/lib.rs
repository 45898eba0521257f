//! JsonDB - embedded path-addressed JSON document store
//!
//! JsonDB stores JSON documents in a single relational table of leaf records
//! (one row per scalar, keyed by its slash-delimited path) and streams them
//! back as JSON.
//!
//! # Quick Start
//!
//! ```ignore
//! use jsondb::{GetOptions, InMemoryJsonDb};
//!
//! let db = InMemoryJsonDb::new()?;
//! db.set("/a", r#"{"b":1,"c":[10,20]}"#.as_bytes())?;
//! db.set("/a/c/0", "99".as_bytes())?;
//!
//! let json = db.get_as_string("/a", &GetOptions::new())?;
//! assert_eq!(json.as_deref(), Some(r#"{"b":1,"c":[99,20]}"#));
//! ```
//!
//! # Architecture
//!
//! - `jsondb-core`: keys, value encoding, flattening and reconstruction,
//!   filters and read options. No database access.
//! - `jsondb-engine`: dialects, SQL generation, transactions, events and the
//!   [`JsonDb`] handle.

pub use jsondb_core::*;
pub use jsondb_engine::*;
