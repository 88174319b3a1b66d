//! File database queries.
//!
//! Files form a forest through `parent_id`. This module creates and updates
//! files, walks the ancestor chain, and answers the sibling/descendant queries
//! used to reconcile content units.

use chrono::{DateTime, Utc};
use mdb_common::{ContentUnitId, ContentUnitType, Error, FileId, Properties, Result, SecurityLevel};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{aliased, db_err, enum_col, free_uid, id_col, opt_id_col, opt_time_col, props_col, time_col};
use crate::models::{File, NewFile};

/// Upper bound on the ancestor walk. The forest is acyclic, so this only
/// guards against corrupted data.
pub const MAX_LINEAGE_DEPTH: i64 = 256;

const FILE_COLUMNS: &[&str] = &[
    "id",
    "uid",
    "name",
    "sha1",
    "size",
    "type",
    "sub_type",
    "mime_type",
    "language",
    "parent_id",
    "content_unit_id",
    "properties",
    "secure",
    "published",
    "file_created_at",
    "created_at",
    "removed_at",
];

fn parse_file_row(row: &Row) -> rusqlite::Result<File> {
    Ok(File {
        id: id_col(row, 0)?,
        uid: row.get(1)?,
        name: row.get(2)?,
        sha1: row.get(3)?,
        size: row.get(4)?,
        file_type: row.get(5)?,
        sub_type: row.get(6)?,
        mime_type: row.get(7)?,
        language: row.get(8)?,
        parent_id: opt_id_col(row, 9)?,
        content_unit_id: opt_id_col(row, 10)?,
        properties: props_col(row, 11)?,
        secure: SecurityLevel::from_i32(row.get(12)?),
        published: row.get(13)?,
        file_created_at: opt_time_col(row, 14)?,
        created_at: time_col(row, 15)?,
        removed_at: opt_time_col(row, 16)?,
    })
}

fn select_files(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<File>> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let files = stmt
        .query_map(params, parse_file_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(files)
}

/// Insert a new file with a freshly allocated UID.
pub fn create_file(conn: &Connection, new: &NewFile) -> Result<File> {
    let id = FileId::new();
    let uid = free_uid(conn, "files")?;
    let now = Utc::now();

    conn.execute(
        "INSERT INTO files (id, uid, name, sha1, size, type, sub_type, mime_type, language,
                            parent_id, properties, file_created_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id.to_string(),
            uid,
            new.name,
            new.sha1,
            new.size,
            new.file_type,
            new.sub_type,
            new.mime_type,
            new.language,
            new.parent_id.map(|p| p.to_string()),
            new.properties.to_json()?,
            new.file_created_at.map(|t| t.to_rfc3339()),
            now.to_rfc3339(),
        ],
    )
    .map_err(db_err)?;

    Ok(File {
        id,
        uid,
        name: new.name.clone(),
        sha1: new.sha1.clone(),
        size: new.size,
        file_type: new.file_type.clone(),
        sub_type: new.sub_type.clone(),
        mime_type: new.mime_type.clone(),
        language: new.language.clone(),
        parent_id: new.parent_id,
        content_unit_id: None,
        properties: new.properties.clone(),
        secure: SecurityLevel::Public,
        published: false,
        file_created_at: new.file_created_at,
        created_at: now,
        removed_at: None,
    })
}

/// Get a file by ID.
pub fn get_file(conn: &Connection, id: FileId) -> Result<File> {
    let sql = format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS.join(", "));
    conn.query_row(&sql, [id.to_string()], parse_file_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("file {}", id)),
            _ => db_err(e),
        })
}

/// Find a file by its (normalized) SHA1.
pub fn find_by_sha1(conn: &Connection, sha1: &str) -> Result<Option<File>> {
    let sql = format!("SELECT {} FROM files WHERE sha1 = ?", FILE_COLUMNS.join(", "));
    conn.query_row(&sql, [sha1], parse_file_row)
        .optional()
        .map_err(db_err)
}

/// Find a file by UID.
pub fn find_by_uid(conn: &Connection, uid: &str) -> Result<Option<File>> {
    let sql = format!("SELECT {} FROM files WHERE uid = ?", FILE_COLUMNS.join(", "));
    conn.query_row(&sql, [uid], parse_file_row)
        .optional()
        .map_err(db_err)
}

/// Persist every mutable column of `file`.
pub fn update_file(conn: &Connection, file: &File) -> Result<()> {
    let rows = conn
        .execute(
            "UPDATE files SET
                name = ?2, sha1 = ?3, size = ?4, type = ?5, sub_type = ?6, mime_type = ?7,
                language = ?8, parent_id = ?9, content_unit_id = ?10, properties = ?11,
                secure = ?12, published = ?13, file_created_at = ?14, removed_at = ?15
             WHERE id = ?1",
            params![
                file.id.to_string(),
                file.name,
                file.sha1,
                file.size,
                file.file_type,
                file.sub_type,
                file.mime_type,
                file.language,
                file.parent_id.map(|p| p.to_string()),
                file.content_unit_id.map(|u| u.to_string()),
                file.properties.to_json()?,
                file.secure.as_i32(),
                file.published,
                file.file_created_at.map(|t| t.to_rfc3339()),
                file.removed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(db_err)?;

    if rows == 0 {
        return Err(Error::not_found(format!("file {}", file.id)));
    }
    Ok(())
}

/// Attach files to a content unit.
pub fn set_content_unit(conn: &Connection, ids: &[FileId], unit: ContentUnitId) -> Result<usize> {
    let mut stmt = conn
        .prepare("UPDATE files SET content_unit_id = ?1 WHERE id = ?2")
        .map_err(db_err)?;
    let mut updated = 0;
    for id in ids {
        updated += stmt
            .execute(params![unit.to_string(), id.to_string()])
            .map_err(db_err)?;
    }
    Ok(updated)
}

/// Set or clear the soft-delete marker.
pub fn set_removed_at(conn: &Connection, id: FileId, at: Option<DateTime<Utc>>) -> Result<()> {
    conn.execute(
        "UPDATE files SET removed_at = ?2 WHERE id = ?1",
        params![id.to_string(), at.map(|t| t.to_rfc3339())],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Merge `patch` into the file's properties and return the result.
pub fn merge_properties(conn: &Connection, id: FileId, patch: &Properties) -> Result<Properties> {
    let mut props = get_file(conn, id)?.properties;
    if props.merge(patch) {
        conn.execute(
            "UPDATE files SET properties = ?2 WHERE id = ?1",
            params![id.to_string(), props.to_json()?],
        )
        .map_err(db_err)?;
    }
    Ok(props)
}

/// Ancestors of a file, nearest (parent) first, root last.
pub fn ancestors(conn: &Connection, id: FileId) -> Result<Vec<File>> {
    let sql = format!(
        "WITH RECURSIVE chain(id, parent_id, depth) AS (
            SELECT id, parent_id, 0 FROM files WHERE id = ?1
            UNION ALL
            SELECT f.id, f.parent_id, chain.depth + 1
            FROM files f INNER JOIN chain ON f.id = chain.parent_id
            WHERE chain.depth < ?2
         )
         SELECT {} FROM chain INNER JOIN files f ON f.id = chain.id
         WHERE chain.depth > 0
         ORDER BY chain.depth",
        aliased(FILE_COLUMNS, "f")
    );
    select_files(conn, &sql, params![id.to_string(), MAX_LINEAGE_DEPTH])
}

/// Direct children of a file.
pub fn children(conn: &Connection, id: FileId) -> Result<Vec<File>> {
    let sql = format!(
        "SELECT {} FROM files WHERE parent_id = ? ORDER BY created_at",
        FILE_COLUMNS.join(", ")
    );
    select_files(conn, &sql, [id.to_string()])
}

/// Files attached to a content unit.
pub fn files_of_unit(conn: &Connection, unit: ContentUnitId) -> Result<Vec<File>> {
    let sql = format!(
        "SELECT {} FROM files WHERE content_unit_id = ? ORDER BY created_at",
        FILE_COLUMNS.join(", ")
    );
    select_files(conn, &sql, [unit.to_string()])
}

/// Units of sibling files (children of `parent`) that parked an
/// `artifact_type` while waiting for their main unit, excluding `exclude`.
pub fn pending_derived_siblings(
    conn: &Connection,
    parent: FileId,
    exclude: ContentUnitId,
) -> Result<Vec<(ContentUnitId, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT cu.id, json_extract(cu.properties, '$.artifact_type')
             FROM files f
             INNER JOIN content_units cu ON f.content_unit_id = cu.id
                AND cu.id != ?2
                AND json_extract(cu.properties, '$.artifact_type') IS NOT NULL
             WHERE f.parent_id = ?1
             ORDER BY cu.created_at",
        )
        .map_err(db_err)?;

    let rows = stmt
        .query_map(params![parent.to_string(), exclude.to_string()], |row| {
            Ok((id_col(row, 0)?, row.get::<_, String>(1)?))
        })
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// Content units attached to a file or any of its descendants, skipping the
/// given unit types.
pub fn descendant_unit_ids(
    conn: &Connection,
    id: FileId,
    excluded: &[ContentUnitType],
) -> Result<Vec<ContentUnitId>> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE rf(id, content_unit_id, depth) AS (
                SELECT id, content_unit_id, 0 FROM files WHERE id = ?1
                UNION ALL
                SELECT f.id, f.content_unit_id, rf.depth + 1
                FROM files f INNER JOIN rf ON f.parent_id = rf.id
                WHERE rf.depth < ?2
             )
             SELECT DISTINCT cu.id, cu.type
             FROM rf INNER JOIN content_units cu ON rf.content_unit_id = cu.id
             ORDER BY cu.created_at",
        )
        .map_err(db_err)?;

    let rows = stmt
        .query_map(params![id.to_string(), MAX_LINEAGE_DEPTH], |row| {
            Ok((
                id_col::<ContentUnitId>(row, 0)?,
                enum_col::<ContentUnitType>(row, 1)?,
            ))
        })
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;

    Ok(rows
        .into_iter()
        .filter(|(_, t)| !excluded.contains(t))
        .map(|(id, _)| id)
        .collect())
}
