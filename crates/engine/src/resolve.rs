//! Caller paths to stored paths
//!
//! An all-digit caller segment may name an array position or an object field
//! such as `"0"`. The container already stored at that point decides: inside
//! an object it is a field name, anywhere else an array position. Paths
//! without all-digit segments never touch the database.

use crate::query::{self, SqlQuery};
use jsondb_core::key::{self, SEPARATOR};
use jsondb_core::options::GetOptions;
use jsondb_core::Result;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

/// Shape of a stored container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    Object,
    Array,
}

/// Kind of the container stored at `db_path`, `None` if nothing is stored
/// below it
pub(crate) fn container_kind(conn: &Connection, db_path: &str) -> Result<Option<ContainerKind>> {
    let q = query::any_child(db_path);
    let child: Option<String> = conn
        .query_row(&q.sql, params_from_iter(q.params.iter()), |row| row.get(0))
        .optional()?;
    Ok(child.and_then(|path| {
        let token = key::tokens(path.get(db_path.len()..)?).next()?;
        Some(if key::is_array_token(token) {
            ContainerKind::Array
        } else {
            ContainerKind::Object
        })
    }))
}

/// Stored form of a caller path
///
/// Every segment is validated before any statement runs.
pub(crate) fn resolve_path(conn: &Connection, path: &str) -> Result<String> {
    key::validate_path(path)?;
    if !key::segments(path).any(key::is_position_segment) {
        return key::to_db_path(path);
    }

    let mut db_path = String::from(SEPARATOR);
    for segment in key::segments(path) {
        let as_position = key::is_position_segment(segment)
            && container_kind(conn, &db_path)? != Some(ContainerKind::Object);
        db_path.push_str(&key::child_token(segment, as_position)?);
    }
    Ok(db_path)
}

/// Subtree query for `get`, with all-digit bound keys resolved against the
/// container at `db_path`
pub(crate) fn subtree_query(conn: &Connection, db_path: &str, options: &GetOptions) -> Result<SqlQuery> {
    let bounds = [
        &options.start_at,
        &options.start_after,
        &options.end_at,
        &options.end_before,
    ];
    for bound in bounds.iter().filter_map(|b| b.as_deref()) {
        key::validate_key(bound)?;
    }
    let positions = !bounds
        .iter()
        .filter_map(|b| b.as_deref())
        .any(key::is_position_segment)
        || container_kind(conn, db_path)? != Some(ContainerKind::Object);
    query::select_subtree(db_path, options, positions)
}
