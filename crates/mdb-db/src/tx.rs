//! Scoped transactions.
//!
//! [`in_transaction`] runs a closure inside one SQLite transaction. The
//! transaction commits only when the closure returns `Ok`; an `Err` return
//! rolls it back, and so does a panic, because rusqlite rolls back a
//! transaction that is dropped without being committed.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use mdb_common::{Error, Result};

/// Run `f` inside an immediate transaction on `conn`.
pub fn in_transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::database(format!("Failed to begin transaction: {}", e)))?;

    match f(&tx) {
        Ok(value) => {
            tx.commit()
                .map_err(|e| Error::database(format!("Failed to commit transaction: {}", e)))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = tx.rollback() {
                tracing::error!("Couldn't roll back transaction: {}", e);
            }
            Err(err)
        }
    }
}
