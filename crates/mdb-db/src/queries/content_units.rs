//! Content unit queries: units, derivation edges and catalog associations.

use chrono::Utc;
use mdb_common::{
    CatalogId, ContentUnitId, ContentUnitType, Error, PersonRole, Properties, Result,
    SecurityLevel,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{aliased, db_err, enum_col, free_uid, id_col, props_col, time_col};
use crate::models::{CatalogKind, ContentUnit, ContentUnitDerivation, UnitPerson};

const UNIT_COLUMNS: &[&str] = &[
    "id",
    "uid",
    "type",
    "published",
    "secure",
    "properties",
    "created_at",
];

fn parse_unit_row(row: &Row) -> rusqlite::Result<ContentUnit> {
    Ok(ContentUnit {
        id: id_col(row, 0)?,
        uid: row.get(1)?,
        unit_type: enum_col(row, 2)?,
        published: row.get(3)?,
        secure: SecurityLevel::from_i32(row.get(4)?),
        properties: props_col(row, 5)?,
        created_at: time_col(row, 6)?,
    })
}

fn parse_derivation_row(row: &Row) -> rusqlite::Result<ContentUnitDerivation> {
    Ok(ContentUnitDerivation {
        source_id: id_col(row, 0)?,
        derived_id: id_col(row, 1)?,
        name: row.get(2)?,
    })
}

fn link_table(kind: CatalogKind) -> (&'static str, &'static str) {
    match kind {
        CatalogKind::Source => ("content_units_sources", "source_id"),
        CatalogKind::Tag => ("content_units_tags", "tag_id"),
        CatalogKind::Person => ("content_units_persons", "person_id"),
        CatalogKind::Publisher => ("content_units_publishers", "publisher_id"),
    }
}

/// Create a content unit with a fresh UID.
pub fn create_content_unit(
    conn: &Connection,
    unit_type: ContentUnitType,
    properties: &Properties,
) -> Result<ContentUnit> {
    let id = ContentUnitId::new();
    let uid = free_uid(conn, "content_units")?;
    let now = Utc::now();

    conn.execute(
        "INSERT INTO content_units (id, uid, type, properties, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.to_string(),
            uid,
            unit_type.as_str(),
            properties.to_json()?,
            now.to_rfc3339(),
        ],
    )
    .map_err(db_err)?;

    Ok(ContentUnit {
        id,
        uid,
        unit_type,
        published: false,
        secure: SecurityLevel::Public,
        properties: properties.clone(),
        created_at: now,
    })
}

/// Get a content unit by ID.
pub fn get_content_unit(conn: &Connection, id: ContentUnitId) -> Result<ContentUnit> {
    let sql = format!(
        "SELECT {} FROM content_units WHERE id = ?",
        UNIT_COLUMNS.join(", ")
    );
    conn.query_row(&sql, [id.to_string()], parse_unit_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::not_found(format!("content unit {}", id))
            }
            _ => db_err(e),
        })
}

/// Find a content unit by UID.
pub fn find_by_uid(conn: &Connection, uid: &str) -> Result<Option<ContentUnit>> {
    let sql = format!(
        "SELECT {} FROM content_units WHERE uid = ?",
        UNIT_COLUMNS.join(", ")
    );
    conn.query_row(&sql, [uid], parse_unit_row)
        .optional()
        .map_err(db_err)
}

pub fn set_type(conn: &Connection, id: ContentUnitId, unit_type: ContentUnitType) -> Result<()> {
    conn.execute(
        "UPDATE content_units SET type = ?2 WHERE id = ?1",
        params![id.to_string(), unit_type.as_str()],
    )
    .map_err(db_err)?;
    Ok(())
}

pub fn set_published(conn: &Connection, id: ContentUnitId, published: bool) -> Result<()> {
    conn.execute(
        "UPDATE content_units SET published = ?2 WHERE id = ?1",
        params![id.to_string(), published],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Replace the whole property bag.
pub fn update_properties(conn: &Connection, id: ContentUnitId, props: &Properties) -> Result<()> {
    conn.execute(
        "UPDATE content_units SET properties = ?2 WHERE id = ?1",
        params![id.to_string(), props.to_json()?],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Merge `patch` into the unit's properties. Returns the merged bag.
pub fn merge_properties(
    conn: &Connection,
    id: ContentUnitId,
    patch: &Properties,
) -> Result<Properties> {
    let mut props = get_content_unit(conn, id)?.properties;
    if props.merge(patch) {
        update_properties(conn, id, &props)?;
    }
    Ok(props)
}

/// Drop a single property key. Returns whether the key was present.
pub fn remove_property(conn: &Connection, id: ContentUnitId, key: &str) -> Result<bool> {
    let path = format!("$.{}", key);
    let rows = conn
        .execute(
            "UPDATE content_units SET properties = json_remove(properties, ?2)
             WHERE id = ?1 AND json_extract(properties, ?2) IS NOT NULL",
            params![id.to_string(), path],
        )
        .map_err(db_err)?;
    Ok(rows > 0)
}

/// Add a `source -> derived` edge. Returns false when the edge already exists.
///
/// An edge whose reverse (same name) is already stored is rejected.
pub fn add_derivation(
    conn: &Connection,
    source: ContentUnitId,
    derived: ContentUnitId,
    name: &str,
) -> Result<bool> {
    if source == derived {
        return Err(Error::invalid_input(format!(
            "content unit {} cannot derive from itself",
            source
        )));
    }

    let reverse: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM content_unit_derivations
                           WHERE source_id = ?1 AND derived_id = ?2)",
            params![derived.to_string(), source.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err)?;
    if reverse {
        return Err(Error::invalid_input(format!(
            "derivation {} -> {} would close a cycle",
            source, derived
        )));
    }

    let rows = conn
        .execute(
            "INSERT OR IGNORE INTO content_unit_derivations (source_id, derived_id, name)
             VALUES (?1, ?2, ?3)",
            params![source.to_string(), derived.to_string(), name],
        )
        .map_err(db_err)?;
    Ok(rows > 0)
}

/// Edges where `source` is the source unit.
pub fn derivations_from(conn: &Connection, source: ContentUnitId) -> Result<Vec<ContentUnitDerivation>> {
    let mut stmt = conn
        .prepare(
            "SELECT source_id, derived_id, name FROM content_unit_derivations
             WHERE source_id = ? ORDER BY name, derived_id",
        )
        .map_err(db_err)?;
    let edges = stmt
        .query_map([source.to_string()], parse_derivation_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(edges)
}

/// Edges where `derived` is the derived unit.
pub fn derivations_to(conn: &Connection, derived: ContentUnitId) -> Result<Vec<ContentUnitDerivation>> {
    let mut stmt = conn
        .prepare(
            "SELECT source_id, derived_id, name FROM content_unit_derivations
             WHERE derived_id = ? ORDER BY name, source_id",
        )
        .map_err(db_err)?;
    let edges = stmt
        .query_map([derived.to_string()], parse_derivation_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(edges)
}

/// First unit of `unit_type` derived from `source`.
pub fn find_derived_by_type(
    conn: &Connection,
    source: ContentUnitId,
    unit_type: ContentUnitType,
) -> Result<Option<ContentUnit>> {
    let sql = format!(
        "SELECT {} FROM content_units cu
         INNER JOIN content_unit_derivations cud ON cud.derived_id = cu.id
         WHERE cud.source_id = ?1 AND cu.type = ?2
         ORDER BY cu.created_at
         LIMIT 1",
        aliased(UNIT_COLUMNS, "cu")
    );
    conn.query_row(
        &sql,
        params![source.to_string(), unit_type.as_str()],
        parse_unit_row,
    )
    .optional()
    .map_err(db_err)
}

/// Publication unit derived from `source` and associated with `publisher`.
pub fn find_publication(
    conn: &Connection,
    source: ContentUnitId,
    publisher: CatalogId,
) -> Result<Option<ContentUnit>> {
    let sql = format!(
        "SELECT {} FROM content_units cu
         INNER JOIN content_unit_derivations cud ON cud.derived_id = cu.id AND cud.source_id = ?1
         INNER JOIN content_units_publishers cup ON cup.content_unit_id = cu.id
            AND cup.publisher_id = ?2
         WHERE cu.type = ?3
         LIMIT 1",
        aliased(UNIT_COLUMNS, "cu")
    );
    conn.query_row(
        &sql,
        params![
            source.to_string(),
            publisher.to_string(),
            ContentUnitType::Publication.as_str()
        ],
        parse_unit_row,
    )
    .optional()
    .map_err(db_err)
}

/// Associate catalog entries (sources, tags or publishers) with a unit.
/// Persons carry a role and go through [`add_person`].
pub fn add_catalog_links(
    conn: &Connection,
    unit: ContentUnitId,
    kind: CatalogKind,
    ids: &[CatalogId],
) -> Result<()> {
    if kind == CatalogKind::Person {
        return Err(Error::invalid_input("persons are linked with a role"));
    }
    let (table, column) = link_table(kind);
    let sql = format!(
        "INSERT OR IGNORE INTO {} (content_unit_id, {}) VALUES (?1, ?2)",
        table, column
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    for id in ids {
        stmt.execute(params![unit.to_string(), id.to_string()])
            .map_err(db_err)?;
    }
    Ok(())
}

pub fn add_person(
    conn: &Connection,
    unit: ContentUnitId,
    person: CatalogId,
    role: PersonRole,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO content_units_persons (content_unit_id, person_id, role)
         VALUES (?1, ?2, ?3)",
        params![unit.to_string(), person.to_string(), role.as_str()],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Catalog ids of `kind` linked to a unit.
pub fn catalog_links(
    conn: &Connection,
    unit: ContentUnitId,
    kind: CatalogKind,
) -> Result<Vec<CatalogId>> {
    let (table, column) = link_table(kind);
    let sql = format!(
        "SELECT DISTINCT {} FROM {} WHERE content_unit_id = ? ORDER BY {}",
        column, table, column
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let ids = stmt
        .query_map([unit.to_string()], |row| id_col(row, 0))
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(ids)
}

pub fn persons(conn: &Connection, unit: ContentUnitId) -> Result<Vec<UnitPerson>> {
    let mut stmt = conn
        .prepare(
            "SELECT person_id, role FROM content_units_persons
             WHERE content_unit_id = ? ORDER BY person_id, role",
        )
        .map_err(db_err)?;
    let persons = stmt
        .query_map([unit.to_string()], |row| {
            Ok(UnitPerson {
                person_id: id_col(row, 0)?,
                role: enum_col(row, 1)?,
            })
        })
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(persons)
}

/// Remove source, tag and person associations. Publishers stay.
pub fn clear_associations(conn: &Connection, unit: ContentUnitId) -> Result<()> {
    for kind in [CatalogKind::Source, CatalogKind::Tag, CatalogKind::Person] {
        let (table, _) = link_table(kind);
        conn.execute(
            &format!("DELETE FROM {} WHERE content_unit_id = ?", table),
            [unit.to_string()],
        )
        .map_err(db_err)?;
    }
    Ok(())
}
