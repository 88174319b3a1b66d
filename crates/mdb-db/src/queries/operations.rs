//! Operation journal queries.
//!
//! Operations are append-only. Besides creating them and linking them to
//! files, this module answers the "closest operation of type X up the file
//! chain" question that capture and trim handlers rely on.

use chrono::Utc;
use mdb_common::{Error, FileId, OperationId, OperationType, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::files::MAX_LINEAGE_DEPTH;
use super::{aliased, db_err, enum_col, free_uid, id_col, props_col, time_col};
use crate::models::{NewOperation, Operation};

const OPERATION_COLUMNS: &[&str] = &[
    "id",
    "uid",
    "type",
    "station",
    "user_email",
    "details",
    "properties",
    "created_at",
];

fn parse_operation_row(row: &Row) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: id_col(row, 0)?,
        uid: row.get(1)?,
        op_type: enum_col(row, 2)?,
        station: row.get(3)?,
        user_email: row.get(4)?,
        details: row.get(5)?,
        properties: props_col(row, 6)?,
        created_at: time_col(row, 7)?,
    })
}

/// Record a new operation.
pub fn create_operation(conn: &Connection, new: &NewOperation) -> Result<Operation> {
    let id = OperationId::new();
    let uid = free_uid(conn, "operations")?;
    let now = Utc::now();

    conn.execute(
        "INSERT INTO operations (id, uid, type, station, user_email, details, properties, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            uid,
            new.op_type.as_str(),
            new.station,
            new.user_email,
            new.details,
            new.properties.to_json()?,
            now.to_rfc3339(),
        ],
    )
    .map_err(db_err)?;

    Ok(Operation {
        id,
        uid,
        op_type: new.op_type,
        station: new.station.clone(),
        user_email: new.user_email.clone(),
        details: new.details.clone(),
        properties: new.properties.clone(),
        created_at: now,
    })
}

/// Get an operation by ID.
pub fn get_operation(conn: &Connection, id: OperationId) -> Result<Operation> {
    let sql = format!(
        "SELECT {} FROM operations WHERE id = ?",
        OPERATION_COLUMNS.join(", ")
    );
    conn.query_row(&sql, [id.to_string()], parse_operation_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("operation {}", id)),
            _ => db_err(e),
        })
}

/// Associate files with an operation. Existing links are kept as is.
pub fn link_files(conn: &Connection, operation: OperationId, files: &[FileId]) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO files_operations (file_id, operation_id) VALUES (?1, ?2)")
        .map_err(db_err)?;
    for file in files {
        stmt.execute(params![file.to_string(), operation.to_string()])
            .map_err(db_err)?;
    }
    Ok(())
}

/// Files linked to an operation.
pub fn operation_file_ids(conn: &Connection, operation: OperationId) -> Result<Vec<FileId>> {
    let mut stmt = conn
        .prepare(
            "SELECT fo.file_id FROM files_operations fo
             INNER JOIN files f ON f.id = fo.file_id
             WHERE fo.operation_id = ?
             ORDER BY f.created_at",
        )
        .map_err(db_err)?;
    let ids = stmt
        .query_map([operation.to_string()], |row| id_col(row, 0))
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(ids)
}

/// Operations a file took part in, oldest first.
pub fn file_operations(conn: &Connection, file: FileId) -> Result<Vec<Operation>> {
    let sql = format!(
        "SELECT {} FROM operations o
         INNER JOIN files_operations fo ON fo.operation_id = o.id
         WHERE fo.file_id = ?
         ORDER BY o.created_at",
        aliased(OPERATION_COLUMNS, "o")
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let ops = stmt
        .query_map([file.to_string()], parse_operation_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(ops)
}

/// Closest operation of `op_type` linked to the file or one of its
/// ancestors. Nearer files win; on the same file the newest operation wins.
pub fn find_up_chain(
    conn: &Connection,
    file: FileId,
    op_type: OperationType,
) -> Result<Option<Operation>> {
    let sql = format!(
        "WITH RECURSIVE chain(id, parent_id, depth) AS (
            SELECT id, parent_id, 0 FROM files WHERE id = ?1
            UNION ALL
            SELECT f.id, f.parent_id, chain.depth + 1
            FROM files f INNER JOIN chain ON f.id = chain.parent_id
            WHERE chain.depth < ?3
         )
         SELECT {} FROM chain
         INNER JOIN files_operations fo ON fo.file_id = chain.id
         INNER JOIN operations o ON o.id = fo.operation_id AND o.type = ?2
         ORDER BY chain.depth, o.created_at DESC
         LIMIT 1",
        aliased(OPERATION_COLUMNS, "o")
    );
    conn.query_row(
        &sql,
        params![file.to_string(), op_type.as_str(), MAX_LINEAGE_DEPTH],
        parse_operation_row,
    )
    .optional()
    .map_err(db_err)
}

/// First file linked to an operation of `op_type` whose `workflow_id`
/// property equals `workflow_id`.
pub fn find_file_by_workflow(
    conn: &Connection,
    op_type: OperationType,
    workflow_id: &str,
) -> Result<Option<FileId>> {
    conn.query_row(
        "SELECT fo.file_id FROM operations o
         INNER JOIN files_operations fo ON fo.operation_id = o.id
         WHERE o.type = ?1 AND json_extract(o.properties, '$.workflow_id') = ?2
         ORDER BY o.created_at
         LIMIT 1",
        params![op_type.as_str(), workflow_id],
        |row| id_col(row, 0),
    )
    .optional()
    .map_err(db_err)
}
