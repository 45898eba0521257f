//! Core types for JsonDB
//!
//! This crate holds everything that does not touch a database:
//! - Error: the single error type and `Result` alias
//! - Key: path token validation and stored/caller path conversion
//! - Encoding: order-preserving encoding of numbers and array positions
//! - Record: flattened leaf rows, value tagging, declared indexes
//! - Filter: query-time child filters and AND/OR combinators
//! - Options: read options (`GetOptions`)
//! - Token / Flatten: streaming JSON to leaf records
//! - Reconstruct: ordered leaf records back to streaming JSON

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod key;
pub mod options;
pub mod reconstruct;
pub mod record;
pub mod token;

pub use error::{Error, Result};
pub use filter::{ChildFilter, Filter, LogicalFilter, LogicalOp, Op};
pub use flatten::{flatten, Flattener};
pub use key::{to_db_path, to_user_path, validate_key, KeyError};
pub use options::{GetOptions, SortOrder};
pub use reconstruct::{records_to_string, Flow, JsonReconstructor, ReconstructOptions};
pub use record::{IndexSet, LeafRecord, Scalar};
pub use token::{JsonTokenReader, Token};
