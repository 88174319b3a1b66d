//! Catalog lookups: sources, tags, persons and publishers by UID.

use mdb_common::{CatalogId, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::{db_err, id_col};
use crate::models::{CatalogEntry, CatalogKind};

/// Outcome of resolving a list of UIDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub found: Vec<CatalogEntry>,
    pub missing: Vec<String>,
}

/// Insert a catalog entry.
pub fn create_entry(conn: &Connection, kind: CatalogKind, uid: &str, name: &str) -> Result<CatalogEntry> {
    let id = CatalogId::new();
    conn.execute(
        &format!("INSERT INTO {} (id, uid, name) VALUES (?1, ?2, ?3)", kind.table()),
        params![id.to_string(), uid, name],
    )
    .map_err(db_err)?;

    Ok(CatalogEntry {
        id,
        kind,
        uid: uid.to_string(),
        name: name.to_string(),
    })
}

/// Insert a person recognized by a lecturer name pattern.
pub fn create_person(conn: &Connection, uid: &str, name: &str, pattern: &str) -> Result<CatalogEntry> {
    let id = CatalogId::new();
    conn.execute(
        "INSERT INTO persons (id, uid, name, pattern) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), uid, name, pattern.to_lowercase()],
    )
    .map_err(db_err)?;

    Ok(CatalogEntry {
        id,
        kind: CatalogKind::Person,
        uid: uid.to_string(),
        name: name.to_string(),
    })
}

pub fn find_by_uid(conn: &Connection, kind: CatalogKind, uid: &str) -> Result<Option<CatalogEntry>> {
    conn.query_row(
        &format!("SELECT id, uid, name FROM {} WHERE uid = ?", kind.table()),
        [uid],
        |row| {
            Ok(CatalogEntry {
                id: id_col(row, 0)?,
                kind,
                uid: row.get(1)?,
                name: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

/// Like [`find_by_uid`] but a missing entry is an error.
pub fn get_by_uid(conn: &Connection, kind: CatalogKind, uid: &str) -> Result<CatalogEntry> {
    find_by_uid(conn, kind, uid)?.ok_or_else(|| Error::not_found(format!("{} {}", kind, uid)))
}

/// Resolve UIDs of one kind. Unknown UIDs are reported, not rejected.
///
/// Found entries keep the order of `uids`; duplicates resolve once.
pub fn resolve_by_uid(conn: &Connection, kind: CatalogKind, uids: &[String]) -> Result<Resolved> {
    let mut resolved = Resolved::default();
    for uid in uids {
        if resolved.found.iter().any(|e| &e.uid == uid) || resolved.missing.contains(uid) {
            continue;
        }
        match find_by_uid(conn, kind, uid)? {
            Some(entry) => resolved.found.push(entry),
            None => resolved.missing.push(uid.clone()),
        }
    }
    Ok(resolved)
}

/// Lowercased lecturer patterns and the person each one identifies.
pub fn lecturer_patterns(conn: &Connection) -> Result<Vec<(String, CatalogId)>> {
    let mut stmt = conn
        .prepare("SELECT pattern, id FROM persons WHERE pattern IS NOT NULL ORDER BY pattern")
        .map_err(db_err)?;
    let patterns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, id_col(row, 1)?)))
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_test_db;

    #[test]
    fn test_resolve_reports_missing() {
        let conn = setup_test_db();
        let a = create_entry(&conn, CatalogKind::Source, "srcuid01", "Zohar").unwrap();
        let b = create_entry(&conn, CatalogKind::Source, "srcuid02", "Talmud").unwrap();

        let uids = vec![
            "srcuid02".to_string(),
            "nosuch01".to_string(),
            "srcuid01".to_string(),
            "srcuid02".to_string(),
        ];
        let resolved = resolve_by_uid(&conn, CatalogKind::Source, &uids).unwrap();
        assert_eq!(resolved.found, vec![b, a]);
        assert_eq!(resolved.missing, vec!["nosuch01".to_string()]);
    }

    #[test]
    fn test_kinds_are_separate() {
        let conn = setup_test_db();
        create_entry(&conn, CatalogKind::Tag, "shareduid", "Tag").unwrap();
        assert!(find_by_uid(&conn, CatalogKind::Source, "shareduid").unwrap().is_none());
        assert!(get_by_uid(&conn, CatalogKind::Publisher, "shareduid")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_lecturer_patterns_include_seed() {
        let conn = setup_test_db();
        create_person(&conn, "peruid01", "Guest", "Guest").unwrap();

        let patterns: Vec<String> = lecturer_patterns(&conn)
            .unwrap()
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(patterns, vec!["guest".to_string(), "rav".to_string()]);
    }
}
