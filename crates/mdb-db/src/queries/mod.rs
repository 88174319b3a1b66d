//! Database query modules.
//!
//! This module organizes all database operations into logical groups:
//! - files: File lineage (creation, ancestry, soft removal)
//! - operations: Operation journal and file links, up-chain search
//! - content_units: Units, derivations, and catalog associations
//! - collections: Collections and their unit memberships
//! - catalog: Sources, tags, persons, publishers resolved by UID
//! - batch_convert: Transcode queue bookkeeping

pub mod batch_convert;
pub mod catalog;
pub mod collections;
pub mod content_units;
pub mod files;
pub mod operations;

use chrono::{DateTime, Utc};
use mdb_common::{uid, Error, Properties, Result};
use rusqlite::{Connection, Row};
use uuid::Uuid;

/// Attempts at drawing an unused UID before giving up.
const UID_ATTEMPTS: usize = 16;

pub(crate) fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
}

pub(crate) fn id_col<T: From<Uuid>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map(T::from)
        .map_err(|e| conversion(idx, e))
}

pub(crate) fn opt_id_col<T: From<Uuid>>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => Uuid::parse_str(&raw)
            .map(|u| Some(T::from(u)))
            .map_err(|e| conversion(idx, e)),
        None => Ok(None),
    }
}

pub(crate) fn time_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(idx, e))
}

pub(crate) fn opt_time_col(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| conversion(idx, e)),
        None => Ok(None),
    }
}

pub(crate) fn props_col(row: &Row, idx: usize) -> rusqlite::Result<Properties> {
    let raw: String = row.get(idx)?;
    Properties::from_json(&raw).map_err(|e| conversion(idx, e))
}

pub(crate) fn enum_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion(idx, e))
}

/// Draw a UID not yet used in `table`.
pub(crate) fn free_uid(conn: &Connection, table: &str) -> Result<String> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE uid = ?)", table);
    for _ in 0..UID_ATTEMPTS {
        let candidate = uid::generate_uid();
        let taken: bool = conn
            .query_row(&sql, [&candidate], |row| row.get(0))
            .map_err(db_err)?;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(Error::internal(format!("No free uid found in {}", table)))
}

/// Prefix every column name with a table alias.
pub(crate) fn aliased(columns: &[&str], alias: &str) -> String {
    columns
        .iter()
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}
