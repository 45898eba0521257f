//! Global transactions
//!
//! `with_global_transaction` runs a caller closure on one transaction and a
//! savepoint inside it. Operations made through the [`TransactionScope`]
//! become visible together on commit. Events are buffered and delivered only
//! after the outer commit succeeds; a failed handler discards them.

use super::{JsonDb, Shared};
use crate::events::{self, PendingEvent};
use crate::session::Session;
use jsondb_core::options::GetOptions;
use jsondb_core::{Error, Result};
use rusqlite::{Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use tracing::{info, warn};

/// Store operations bound to an open global transaction
///
/// The scope exposes no commit or rollback: the outcome is decided by the
/// handler's return value.
pub struct TransactionScope<'t> {
    session: Session<'t>,
}

impl<'t> TransactionScope<'t> {
    /// Whether anything is stored at or below `path`
    pub fn exists(&self, path: &str) -> Result<bool> {
        self.session.exists(&self.session.resolve(path)?)
    }

    /// Replace the value at `path`
    pub fn set<R: Read>(&mut self, path: &str, json: R) -> Result<()> {
        let db_path = self.session.resolve(path)?;
        self.session.set(&db_path, json)
    }

    /// Replace the value at `path` from an in-memory value
    pub fn set_value(&mut self, path: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| Error::invalid_input(e.to_string()))?;
        self.set(path, bytes.as_slice())
    }

    /// Set each top-level field of a JSON object below `path`
    pub fn update<R: Read>(&mut self, path: &str, json: R) -> Result<()> {
        let db_path = self.session.resolve(path)?;
        self.session.update(&db_path, json)
    }

    /// Remove the value at `path`
    pub fn delete(&mut self, path: &str) -> Result<bool> {
        let db_path = self.session.resolve(path)?;
        self.session.delete(&db_path)
    }

    /// Store under a new time-ordered key below `path`
    pub fn push<R: Read>(&mut self, path: &str, json: R) -> Result<String> {
        let db_path = self.session.resolve(path)?;
        self.session.push(&db_path, json)
    }

    /// Write the value at `path` to `out`, seeing this transaction's own
    /// uncommitted changes. `None` if nothing is stored there.
    pub fn write_to<W: Write>(&self, path: &str, options: &GetOptions, out: W) -> Result<Option<W>> {
        let db_path = self.session.resolve(path)?;
        self.session.write_subtree(&db_path, options, out)
    }

    /// The value at `path` as a string
    pub fn get_as_string(&self, path: &str, options: &GetOptions) -> Result<Option<String>> {
        match self.write_to(path, options, Vec::new())? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| Error::corruption(e.to_string())),
            None => Ok(None),
        }
    }

    /// Keys of the children of `container` whose `field` equals `value`
    pub fn fetch_ids_by_property_value(
        &self,
        container: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<BTreeSet<String>> {
        self.session.fetch_ids_by_property_value(container, field, value)
    }
}

impl JsonDb {
    /// Run `handler` inside one transaction
    ///
    /// If the handler returns `Ok`, everything it did is committed and its
    /// events are broadcast. If it returns `Err`, everything is rolled back,
    /// no events are broadcast and the error is returned unchanged.
    ///
    /// ```ignore
    /// db.with_global_transaction(|tx| {
    ///     tx.set("/accounts/a/balance", "90".as_bytes())?;
    ///     tx.set("/accounts/b/balance", "110".as_bytes())?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn with_global_transaction<T, F>(&self, handler: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionScope<'_>) -> Result<T>,
    {
        let shared = self.shared();
        let mut conn = shared.connect()?;
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        info!(target: "jsondb::txn", "Global transaction started");

        match run_in_savepoint(&mut tx, shared, handler) {
            Ok((value, pending)) => {
                tx.commit()?;
                info!(
                    target: "jsondb::txn",
                    events = pending.len(),
                    "Global transaction committed"
                );
                events::deliver(shared.events.as_ref(), pending);
                Ok(value)
            }
            Err(e) => {
                warn!(target: "jsondb::txn", error = %e, "Global transaction rolled back");
                if let Err(rollback) = tx.rollback() {
                    warn!(target: "jsondb::txn", error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

fn run_in_savepoint<T, F>(
    tx: &mut Transaction<'_>,
    shared: &Shared,
    handler: F,
) -> Result<(T, Vec<PendingEvent>)>
where
    F: FnOnce(&mut TransactionScope<'_>) -> Result<T>,
{
    let mut savepoint = tx.savepoint()?;
    let mut scope = TransactionScope {
        session: Session::new(&savepoint, shared),
    };
    match handler(&mut scope) {
        Ok(value) => {
            let pending = scope.session.into_events();
            savepoint.commit()?;
            Ok((value, pending))
        }
        Err(e) => {
            drop(scope);
            if let Err(rollback) = savepoint.rollback() {
                warn!(target: "jsondb::txn", error = %rollback, "Savepoint rollback failed");
            }
            Err(e)
        }
    }
}
