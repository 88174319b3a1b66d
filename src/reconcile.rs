//! Collection reconciliation.
//!
//! Parts of one recorded lesson arrive as separate sends. They converge on a
//! single collection through the capture id stamped on the `capture_stop`
//! operation somewhere up their file lineage.

use mdb_common::{CollectionType, ContentUnitType, OperationType, Properties, Result, ResultExt};
use mdb_db::models::{Collection, CollectionContentUnit, ContentUnit, File};
use mdb_db::queries::{collections, operations};
use rusqlite::Connection;

use crate::registry::Registry;
use crate::requests::CitMetadata;

/// Collection a unit belongs to, and what happened to it on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub collection: Collection,
    pub created: bool,
    pub updated: bool,
}

pub struct CollectionReconciler<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> CollectionReconciler<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    /// Find, create or update the collection for a unit described by `meta`.
    ///
    /// `unit_props` seeds the properties of a new collection.
    pub fn reconcile(
        &self,
        meta: &CitMetadata,
        original: &File,
        unit_props: &Properties,
    ) -> Result<Option<Reconciled>> {
        if let Some(uid) = meta.collection_uid.as_deref().filter(|u| !u.is_empty()) {
            tracing::info!("Specific collection {}", uid);
            let found = collections::find_by_uid(self.conn, uid).context("Lookup collection")?;
            if found.is_none() {
                tracing::warn!("No such collection {}", uid);
            }
            return Ok(found.map(|collection| Reconciled {
                collection,
                created: false,
                updated: false,
            }));
        }

        if !meta.content_type.is_lesson() {
            return Ok(None);
        }

        tracing::info!("Daily lesson reconciliation");
        let Some(capture_id) = self.capture_id(original)? else {
            return Ok(None);
        };

        let collection_type = if meta.week_date.is_some() {
            CollectionType::SaturdayLesson
        } else {
            CollectionType::DailyLesson
        };
        let props = unit_props
            .clone()
            .with("capture_id", capture_id.as_str())
            .with_opt("number", meta.number);

        match collections::find_by_capture_id(self.conn, &capture_id)? {
            None => {
                let collection = collections::create_collection(self.conn, collection_type, &props)
                    .context("Create collection")?;
                tracing::info!(uid = %collection.uid, "Created {} collection for capture {}", collection_type, capture_id);
                Ok(Some(Reconciled {
                    collection,
                    created: true,
                    updated: false,
                }))
            }
            Some(mut collection) if meta.content_type == ContentUnitType::FullLesson => {
                tracing::info!("Full lesson, overriding collection {} properties", collection.uid);
                let mut updated = false;
                if collection.collection_type != collection_type {
                    tracing::info!("Full lesson, collection type changed to {}", collection_type);
                    collections::set_type(self.conn, collection.id, collection_type)?;
                    collection.collection_type = collection_type;
                    updated = true;
                }
                let mut merged = collection.properties.clone();
                if merged.merge(&props) {
                    collection.properties = collections::merge_properties(self.conn, collection.id, &props)
                        .context("Update collection properties")?;
                    updated = true;
                }
                Ok(Some(Reconciled {
                    collection,
                    created: false,
                    updated,
                }))
            }
            Some(collection) => Ok(Some(Reconciled {
                collection,
                created: false,
                updated: false,
            })),
        }
    }

    /// Add `unit` to `collection` under its slot name.
    pub fn link(
        &self,
        collection: &Collection,
        unit: &ContentUnit,
        meta: &CitMetadata,
    ) -> Result<CollectionContentUnit> {
        let name = slot_name(self.registry, meta, collection.collection_type);
        tracing::info!("Associating unit {} with collection {} as {:?}", unit.uid, collection.uid, name);
        collections::add_content_unit(self.conn, collection.id, unit.id, &name)
            .context("Save collection and content unit association")
    }

    /// Capture id from the nearest `capture_stop` up the lineage of `file`.
    fn capture_id(&self, file: &File) -> Result<Option<String>> {
        let Some(op) = operations::find_up_chain(self.conn, file.id, OperationType::CaptureStop)?
        else {
            tracing::warn!("No capture_stop operation up the chain of file {}", file.uid);
            return Ok(None);
        };
        match op.properties.get("collection_uid") {
            Some(value) => Ok(Some(value.to_string())),
            None => {
                tracing::warn!("No collection_uid in capture_stop {} properties", op.uid);
                Ok(None)
            }
        }
    }
}

/// Name of a unit's slot in a collection of `collection_type`.
pub fn slot_name(registry: &Registry, meta: &CitMetadata, collection_type: CollectionType) -> String {
    let number = || meta.number.map(|n| n.to_string()).unwrap_or_default();
    match meta.content_type {
        ContentUnitType::FullLesson if collection_type.is_lesson_day() => "full".to_string(),
        ContentUnitType::FullLesson => number(),
        ContentUnitType::LessonPart => meta.part.map(|p| p.to_string()).unwrap_or_default(),
        ContentUnitType::VideoProgramChapter => meta.episode.clone().unwrap_or_default(),
        _ => {
            let name = number();
            match meta.part_type.and_then(|pt| registry.event_part_label(pt)) {
                Some(label) => format!("{}{}", label, name),
                None => name,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mdb_db::models::{NewFile, NewOperation};
    use mdb_db::pool::{get_conn, init_memory_pool};
    use mdb_db::queries::files;

    fn meta(content_type: ContentUnitType) -> CitMetadata {
        CitMetadata {
            content_type,
            capture_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            week_date: None,
            language: "heb".into(),
            has_translation: false,
            lecturer: None,
            number: Some(2),
            part: Some(1),
            part_type: None,
            episode: Some("ep-7".into()),
            sources: vec![],
            tags: vec![],
            artifact_type: None,
            collection_uid: None,
            final_name: None,
            manual_name: None,
            require_test: false,
        }
    }

    #[test]
    fn test_slot_names() {
        let registry = Registry::default();

        let full = meta(ContentUnitType::FullLesson);
        assert_eq!(slot_name(&registry, &full, CollectionType::DailyLesson), "full");
        assert_eq!(slot_name(&registry, &full, CollectionType::SaturdayLesson), "full");
        assert_eq!(slot_name(&registry, &full, CollectionType::Congress), "2");

        let part = meta(ContentUnitType::LessonPart);
        assert_eq!(slot_name(&registry, &part, CollectionType::DailyLesson), "1");

        let chapter = meta(ContentUnitType::VideoProgramChapter);
        assert_eq!(slot_name(&registry, &chapter, CollectionType::VideoProgram), "ep-7");
    }

    #[test]
    fn test_event_part_prefix() {
        let registry = Registry::default();
        let mut m = meta(ContentUnitType::EventPart);

        assert_eq!(slot_name(&registry, &m, CollectionType::Congress), "2");
        m.part_type = Some(2);
        assert_eq!(slot_name(&registry, &m, CollectionType::Congress), "2");
        m.part_type = Some(4);
        assert_eq!(slot_name(&registry, &m, CollectionType::Congress), "yh_2");
        m.part_type = Some(42);
        assert_eq!(slot_name(&registry, &m, CollectionType::Congress), "2");
        m.number = None;
        m.part_type = Some(3);
        assert_eq!(slot_name(&registry, &m, CollectionType::Congress), "tiur_");
    }

    fn file(conn: &Connection, name: &str, parent: Option<&File>) -> File {
        files::create_file(
            conn,
            &NewFile {
                name: name.to_string(),
                parent_id: parent.map(|p| p.id),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn capture_stop(conn: &Connection, file: &File, props: Properties) {
        let op = operations::create_operation(
            conn,
            &NewOperation {
                op_type: OperationType::CaptureStop,
                station: None,
                user_email: None,
                details: None,
                properties: props,
            },
        )
        .unwrap();
        operations::link_files(conn, op.id, &[file.id]).unwrap();
    }

    fn count_collections(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM collections", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_explicit_collection_uid() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let registry = Registry::default();
        let reconciler = CollectionReconciler::new(&conn, &registry);
        let original = file(&conn, "o.mp4", None);

        let existing = collections::create_collection(
            &conn,
            CollectionType::Congress,
            &Properties::new().with("name", "summer"),
        )
        .unwrap();

        let mut m = meta(ContentUnitType::EventPart);
        m.collection_uid = Some(existing.uid.clone());
        let found = reconciler
            .reconcile(&m, &original, &Properties::new().with("name", "other"))
            .unwrap()
            .unwrap();
        assert_eq!(found.collection.id, existing.id);
        assert_eq!(found.collection.properties.get_str("name"), Some("summer"));
        assert!(!found.created);
        assert!(!found.updated);

        m.collection_uid = Some("MISSING0".into());
        assert_eq!(reconciler.reconcile(&m, &original, &Properties::new()).unwrap(), None);
        assert_eq!(count_collections(&conn), 1);
    }

    #[test]
    fn test_lesson_without_capture_id_is_skipped() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let registry = Registry::default();
        let reconciler = CollectionReconciler::new(&conn, &registry);
        let m = meta(ContentUnitType::LessonPart);

        let bare = file(&conn, "bare.mp4", None);
        assert_eq!(reconciler.reconcile(&m, &bare, &Properties::new()).unwrap(), None);

        let captured = file(&conn, "captured.mp4", None);
        capture_stop(&conn, &captured, Properties::new().with("capture_source", "mltcap"));
        let child = file(&conn, "child.mp4", Some(&captured));
        assert_eq!(reconciler.reconcile(&m, &child, &Properties::new()).unwrap(), None);

        assert_eq!(count_collections(&conn), 0);
    }

    #[test]
    fn test_non_lesson_without_uid_is_skipped() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let registry = Registry::default();
        let reconciler = CollectionReconciler::new(&conn, &registry);

        let original = file(&conn, "o.mp4", None);
        capture_stop(&conn, &original, Properties::new().with("collection_uid", "c1"));
        let m = meta(ContentUnitType::Lecture);
        assert_eq!(reconciler.reconcile(&m, &original, &Properties::new()).unwrap(), None);
        assert_eq!(count_collections(&conn), 0);
    }

    #[test]
    fn test_capture_id_from_ancestor() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let registry = Registry::default();
        let reconciler = CollectionReconciler::new(&conn, &registry);

        let root = file(&conn, "capture.mp4", None);
        capture_stop(&conn, &root, Properties::new().with("collection_uid", "c1"));
        let original = file(&conn, "part.mp4", Some(&root));

        let created = reconciler
            .reconcile(
                &meta(ContentUnitType::LessonPart),
                &original,
                &Properties::new().with("film_date", "2024-05-01"),
            )
            .unwrap()
            .unwrap();
        assert!(created.created);
        assert_eq!(created.collection.collection_type, CollectionType::DailyLesson);
        assert_eq!(created.collection.properties.get_str("capture_id"), Some("c1"));
        assert_eq!(created.collection.properties.get_i64("number"), Some(2));
        assert_eq!(created.collection.properties.get_str("film_date"), Some("2024-05-01"));
    }

    #[test]
    fn test_partial_lesson_keeps_existing_collection() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let registry = Registry::default();
        let reconciler = CollectionReconciler::new(&conn, &registry);

        let original = file(&conn, "o.mp4", None);
        capture_stop(&conn, &original, Properties::new().with("collection_uid", "c1"));

        let mut full = meta(ContentUnitType::FullLesson);
        full.week_date = NaiveDate::from_ymd_opt(2024, 5, 4);
        let first = reconciler
            .reconcile(&full, &original, &Properties::new().with("film_date", "2024-05-01"))
            .unwrap()
            .unwrap();
        assert!(first.created);
        assert_eq!(first.collection.collection_type, CollectionType::SaturdayLesson);

        let mut part = meta(ContentUnitType::LessonPart);
        part.number = Some(9);
        let second = reconciler
            .reconcile(&part, &original, &Properties::new().with("film_date", "2024-06-01"))
            .unwrap()
            .unwrap();
        assert!(!second.created);
        assert!(!second.updated);
        assert_eq!(second.collection.id, first.collection.id);

        let stored = collections::get_collection(&conn, first.collection.id).unwrap();
        assert_eq!(stored.collection_type, CollectionType::SaturdayLesson);
        assert_eq!(stored.properties.get_i64("number"), Some(2));
        assert_eq!(stored.properties.get_str("film_date"), Some("2024-05-01"));
    }

    #[test]
    fn test_full_lesson_upgrades_existing_collection() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let registry = Registry::default();
        let reconciler = CollectionReconciler::new(&conn, &registry);

        let original = file(&conn, "o.mp4", None);
        capture_stop(&conn, &original, Properties::new().with("collection_uid", "c1"));

        let part = meta(ContentUnitType::LessonPart);
        let first = reconciler
            .reconcile(&part, &original, &Properties::new())
            .unwrap()
            .unwrap();
        assert_eq!(first.collection.collection_type, CollectionType::DailyLesson);

        let mut full = meta(ContentUnitType::FullLesson);
        full.week_date = NaiveDate::from_ymd_opt(2024, 5, 4);
        let upgraded = reconciler
            .reconcile(&full, &original, &Properties::new().with("film_date", "2024-05-01"))
            .unwrap()
            .unwrap();
        assert!(!upgraded.created);
        assert!(upgraded.updated);
        assert_eq!(upgraded.collection.id, first.collection.id);
        assert_eq!(upgraded.collection.collection_type, CollectionType::SaturdayLesson);

        let again = reconciler
            .reconcile(&full, &original, &Properties::new().with("film_date", "2024-05-01"))
            .unwrap()
            .unwrap();
        assert!(!again.updated);
        assert_eq!(count_collections(&conn), 1);
    }
}
