//! Collection queries and unit memberships.

use chrono::Utc;
use mdb_common::{
    CollectionId, CollectionType, ContentUnitId, Error, Properties, Result, SecurityLevel,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{aliased, db_err, enum_col, free_uid, id_col, props_col, time_col};
use crate::models::{Collection, CollectionContentUnit};

const COLLECTION_COLUMNS: &[&str] = &[
    "id",
    "uid",
    "type",
    "published",
    "secure",
    "properties",
    "created_at",
];

fn parse_collection_row(row: &Row) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: id_col(row, 0)?,
        uid: row.get(1)?,
        collection_type: enum_col(row, 2)?,
        published: row.get(3)?,
        secure: SecurityLevel::from_i32(row.get(4)?),
        properties: props_col(row, 5)?,
        created_at: time_col(row, 6)?,
    })
}

fn parse_membership_row(row: &Row) -> rusqlite::Result<CollectionContentUnit> {
    Ok(CollectionContentUnit {
        collection_id: id_col(row, 0)?,
        content_unit_id: id_col(row, 1)?,
        name: row.get(2)?,
        position: row.get(3)?,
    })
}

/// Create a collection with a fresh UID.
pub fn create_collection(
    conn: &Connection,
    collection_type: CollectionType,
    properties: &Properties,
) -> Result<Collection> {
    let id = CollectionId::new();
    let uid = free_uid(conn, "collections")?;
    let now = Utc::now();

    conn.execute(
        "INSERT INTO collections (id, uid, type, properties, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.to_string(),
            uid,
            collection_type.as_str(),
            properties.to_json()?,
            now.to_rfc3339(),
        ],
    )
    .map_err(db_err)?;

    Ok(Collection {
        id,
        uid,
        collection_type,
        published: false,
        secure: SecurityLevel::Public,
        properties: properties.clone(),
        created_at: now,
    })
}

/// Get a collection by ID.
pub fn get_collection(conn: &Connection, id: CollectionId) -> Result<Collection> {
    let sql = format!(
        "SELECT {} FROM collections WHERE id = ?",
        COLLECTION_COLUMNS.join(", ")
    );
    conn.query_row(&sql, [id.to_string()], parse_collection_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("collection {}", id)),
            _ => db_err(e),
        })
}

/// Find a collection by UID.
pub fn find_by_uid(conn: &Connection, uid: &str) -> Result<Option<Collection>> {
    let sql = format!(
        "SELECT {} FROM collections WHERE uid = ?",
        COLLECTION_COLUMNS.join(", ")
    );
    conn.query_row(&sql, [uid], parse_collection_row)
        .optional()
        .map_err(db_err)
}

/// Find the collection carrying `capture_id` in its properties. The oldest
/// wins if several do.
pub fn find_by_capture_id(conn: &Connection, capture_id: &str) -> Result<Option<Collection>> {
    let sql = format!(
        "SELECT {} FROM collections
         WHERE json_extract(properties, '$.capture_id') = ?
         ORDER BY created_at
         LIMIT 1",
        COLLECTION_COLUMNS.join(", ")
    );
    conn.query_row(&sql, [capture_id], parse_collection_row)
        .optional()
        .map_err(db_err)
}

pub fn set_type(conn: &Connection, id: CollectionId, collection_type: CollectionType) -> Result<()> {
    conn.execute(
        "UPDATE collections SET type = ?2 WHERE id = ?1",
        params![id.to_string(), collection_type.as_str()],
    )
    .map_err(db_err)?;
    Ok(())
}

pub fn set_published(conn: &Connection, id: CollectionId, published: bool) -> Result<()> {
    conn.execute(
        "UPDATE collections SET published = ?2 WHERE id = ?1",
        params![id.to_string(), published],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Merge `patch` into the collection's properties. Returns the merged bag.
pub fn merge_properties(
    conn: &Connection,
    id: CollectionId,
    patch: &Properties,
) -> Result<Properties> {
    let mut props = get_collection(conn, id)?.properties;
    if props.merge(patch) {
        conn.execute(
            "UPDATE collections SET properties = ?2 WHERE id = ?1",
            params![id.to_string(), props.to_json()?],
        )
        .map_err(db_err)?;
    }
    Ok(props)
}

/// Link a unit into a collection under slot `name`.
///
/// New members are appended after the current last position. Linking an
/// existing member again only updates its slot name.
pub fn add_content_unit(
    conn: &Connection,
    collection: CollectionId,
    unit: ContentUnitId,
    name: &str,
) -> Result<CollectionContentUnit> {
    conn.execute(
        "INSERT INTO collections_content_units (collection_id, content_unit_id, name, position)
         VALUES (?1, ?2, ?3,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM collections_content_units
                  WHERE collection_id = ?1))
         ON CONFLICT (collection_id, content_unit_id) DO UPDATE SET name = excluded.name",
        params![collection.to_string(), unit.to_string(), name],
    )
    .map_err(db_err)?;

    conn.query_row(
        "SELECT collection_id, content_unit_id, name, position FROM collections_content_units
         WHERE collection_id = ?1 AND content_unit_id = ?2",
        params![collection.to_string(), unit.to_string()],
        parse_membership_row,
    )
    .map_err(db_err)
}

/// Members of a collection in position order.
pub fn memberships(conn: &Connection, collection: CollectionId) -> Result<Vec<CollectionContentUnit>> {
    let mut stmt = conn
        .prepare(
            "SELECT collection_id, content_unit_id, name, position FROM collections_content_units
             WHERE collection_id = ? ORDER BY position",
        )
        .map_err(db_err)?;
    let members = stmt
        .query_map([collection.to_string()], parse_membership_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(members)
}

/// Collections a unit belongs to.
pub fn collections_of_unit(conn: &Connection, unit: ContentUnitId) -> Result<Vec<Collection>> {
    let sql = format!(
        "SELECT {} FROM collections c
         INNER JOIN collections_content_units ccu ON ccu.collection_id = c.id
         WHERE ccu.content_unit_id = ?
         ORDER BY c.created_at",
        aliased(COLLECTION_COLUMNS, "c")
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let collections = stmt
        .query_map([unit.to_string()], parse_collection_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(collections)
}
