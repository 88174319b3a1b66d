//! End to end flows through the dispatcher: a recording travels from capture
//! to publication, and the archive metadata converges whatever the order in
//! which the studio reports its steps.

mod common;

use common::{sha, TestHarness};
use mdb::derivation::ARTIFACT_TYPE;
use mdb::events::DomainEvent;
use mdb_common::{CollectionType, ContentUnitType, OperationType};
use mdb_db::queries::{batch_convert, collections, content_units, files};
use serde_json::json;

fn lesson_part(part: i64) -> serde_json::Value {
    json!({
        "content_type": "LESSON_PART",
        "capture_date": "2024-05-01",
        "language": "heb",
        "lecturer": "rav",
        "number": 1,
        "part": part
    })
}

#[test]
fn test_capture_to_publication() {
    let h = TestHarness::new();
    h.capture("wf-1", "cap-1", 1);
    h.demux(1, 2);

    let out = h.send(2, lesson_part(1)).unwrap();
    let unit = h.unit_of(2);
    let collection = collections::find_by_capture_id(&h.conn(), "cap-1").unwrap().unwrap();
    assert_eq!(
        out.events,
        vec![DomainEvent::unit_created(&unit), DomainEvent::collection_created(&collection)]
    );
    assert_eq!(collection.collection_type, CollectionType::DailyLesson);

    // Original, proxy and the capture file all belong to the unit.
    for n in 1..=3 {
        assert_eq!(h.file(n).content_unit_id, Some(unit.id));
    }
    let persons = content_units::persons(&h.conn(), unit.id).unwrap();
    assert_eq!(persons.len(), 1);

    h.ok(
        OperationType::Convert,
        json!({"sha1": sha(3), "output": [
            {"file_name": "p_heb.mp4", "sha1": sha(10)},
            {"file_name": "p_rus.mp4", "sha1": sha(11)}
        ]}),
    );
    assert_eq!(h.file(10).parent_id, Some(h.file(3).id));

    let events = h.ok(OperationType::Upload, json!({"file_name": "p3.mp4", "sha1": sha(3), "url": "https://cdn/p3.mp4"}));
    let proxy = h.file(3);
    assert_eq!(
        events,
        vec![
            DomainEvent::file_published(&proxy),
            DomainEvent::unit_published(&unit),
            DomainEvent::collection_published(&collection),
        ]
    );
    assert!(h.unit_of(3).published);
    assert!(collections::get_collection(&h.conn(), collection.id).unwrap().published);

    // The sink saw every committed event in order.
    let recorded = h.sink.events();
    assert_eq!(recorded.len(), 5);
    assert_eq!(recorded[0], DomainEvent::unit_created(&unit));
}

#[test]
fn test_full_lesson_upgrades_collection() {
    let h = TestHarness::new();
    h.capture("wf-a", "cap-9", 1);
    h.capture("wf-b", "cap-9", 20);
    h.demux(1, 2);
    h.demux(20, 21);

    h.send(2, lesson_part(1)).unwrap();
    let collection = collections::find_by_capture_id(&h.conn(), "cap-9").unwrap().unwrap();
    assert_eq!(collection.collection_type, CollectionType::DailyLesson);

    let out = h
        .send(
            21,
            json!({
                "content_type": "FULL_LESSON",
                "capture_date": "2024-05-04",
                "week_date": "2024-05-04",
                "language": "heb",
                "number": 1
            }),
        )
        .unwrap();

    let full = h.unit_of(21);
    assert_eq!(full.unit_type, ContentUnitType::FullLesson);
    assert_eq!(
        out.events,
        vec![DomainEvent::unit_created(&full), DomainEvent::collection_updated(&collection)]
    );

    let upgraded = collections::get_collection(&h.conn(), collection.id).unwrap();
    assert_eq!(upgraded.collection_type, CollectionType::SaturdayLesson);
    assert_eq!(upgraded.properties.get_str("film_date"), Some("2024-05-04"));

    let mut slots: Vec<String> = collections::memberships(&h.conn(), collection.id)
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    slots.sort();
    assert_eq!(slots, vec!["1", "full"]);
}

fn lesson_slots(h: &TestHarness, capture_id: &str) -> Vec<String> {
    let conn = h.conn();
    let collections_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM collections", [], |r| r.get(0))
        .unwrap();
    assert_eq!(collections_count, 1);

    let collection = collections::find_by_capture_id(&conn, capture_id).unwrap().unwrap();
    let mut slots: Vec<String> = collections::memberships(&conn, collection.id)
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    slots.sort();
    slots
}

#[test]
fn test_lesson_parts_converge_in_any_order() {
    for order in [[1, 2], [2, 1]] {
        let h = TestHarness::new();
        h.capture("wf-a", "cap-5", 1);
        h.capture("wf-b", "cap-5", 10);
        h.demux(1, 2);
        h.demux(10, 11);

        for part in order {
            let original = if part == 1 { 2 } else { 11 };
            h.send(original, lesson_part(part)).unwrap();
        }

        assert_eq!(lesson_slots(&h, "cap-5"), vec!["1", "2"], "order {:?}", order);
        let collection = collections::find_by_capture_id(&h.conn(), "cap-5").unwrap().unwrap();
        assert_eq!(collection.collection_type, CollectionType::DailyLesson);
        assert_eq!(collection.properties.get_i64("number"), Some(1));
    }
}

#[test]
fn test_full_lesson_first_then_parts() {
    let h = TestHarness::new();
    h.capture("wf-full", "cap-7", 1);
    h.capture("wf-p2", "cap-7", 10);
    h.capture("wf-p1", "cap-7", 20);
    h.demux(1, 2);
    h.demux(10, 11);
    h.demux(20, 21);

    let out = h
        .send(
            2,
            json!({
                "content_type": "FULL_LESSON",
                "capture_date": "2024-05-04",
                "week_date": "2024-05-04",
                "language": "heb",
                "number": 1
            }),
        )
        .unwrap();
    let collection = collections::find_by_capture_id(&h.conn(), "cap-7").unwrap().unwrap();
    assert_eq!(collection.collection_type, CollectionType::SaturdayLesson);
    assert!(out.events.contains(&DomainEvent::collection_created(&collection)));

    // Later parts join the collection without rewriting it.
    h.send(11, lesson_part(2)).unwrap();
    h.send(21, lesson_part(1)).unwrap();

    assert_eq!(lesson_slots(&h, "cap-7"), vec!["1", "2", "full"]);
    let stored = collections::get_collection(&h.conn(), collection.id).unwrap();
    assert_eq!(stored.collection_type, CollectionType::SaturdayLesson);
    assert_eq!(stored.properties, collection.properties);
}

fn kitei_makor() -> serde_json::Value {
    json!({
        "content_type": "KITEI_MAKOR",
        "capture_date": "2024-05-01",
        "language": "heb",
        "artifact_type": "kitei_makor"
    })
}

/// Main and derived recordings of one capture, sent in the given order.
/// Returns the (main, derived) unit ids.
fn derived_flow(main_first: bool) -> (TestHarness, mdb_common::ContentUnitId, mdb_common::ContentUnitId) {
    let h = TestHarness::new();
    h.capture("wf-d", "cap-d", 1);
    h.demux(1, 2);
    h.demux(1, 4);

    if main_first {
        h.send(2, lesson_part(1)).unwrap();
        h.send(4, kitei_makor()).unwrap();
    } else {
        h.send(4, kitei_makor()).unwrap();
        let parked = h.unit_of(4);
        assert_eq!(parked.properties.get_str(ARTIFACT_TYPE), Some("kitei_makor"));
        h.send(2, lesson_part(1)).unwrap();
    }

    let main = h.unit_of(2).id;
    let derived = h.unit_of(4).id;
    (h, main, derived)
}

#[test]
fn test_derived_units_link_in_any_order() {
    for main_first in [true, false] {
        let (h, main, derived) = derived_flow(main_first);
        let conn = h.conn();

        let edges = content_units::derivations_from(&conn, main).unwrap();
        assert_eq!(edges.len(), 1, "main_first={}", main_first);
        assert_eq!(edges[0].derived_id, derived);
        assert_eq!(edges[0].name, "kitei_makor");

        let derived_unit = content_units::get_content_unit(&conn, derived).unwrap();
        assert!(!derived_unit.properties.contains_key(ARTIFACT_TYPE));
        assert_eq!(derived_unit.unit_type, ContentUnitType::KiteiMakor);
    }
}

#[test]
fn test_reconvert_is_idempotent() {
    let h = TestHarness::new();
    h.capture("wf-c", "cap-c", 1);
    h.demux(1, 2);

    let payload = json!({"sha1": sha(2), "output": [
        {"file_name": "a.mp4", "sha1": sha(10), "duration": 10.0},
        {"file_name": "b.mp4", "sha1": sha(11), "duration": 10.0}
    ]});
    assert!(h.ok(OperationType::Convert, payload.clone()).is_empty());
    let first = (h.file(10), h.file(11));

    let events = h.ok(OperationType::Convert, payload);
    assert_eq!(events, vec![DomainEvent::file_updated(&first.0), DomainEvent::file_updated(&first.1)]);

    let conn = h.conn();
    assert_eq!(files::children(&conn, h_file_id(&conn, 2)).unwrap().len(), 2);
    let converts: i64 = conn
        .query_row("SELECT COUNT(*) FROM operations WHERE type = 'convert'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(converts, 2);
}

fn h_file_id(conn: &rusqlite::Connection, n: u32) -> mdb_common::FileId {
    files::find_by_sha1(conn, &sha(n)).unwrap().unwrap().id
}

#[test]
fn test_failed_transcode_leaves_no_trace() {
    let h = TestHarness::new();
    h.capture("wf-t", "cap-t", 1);
    h.demux(1, 2);
    let original = h.file(2).id;
    batch_convert::enqueue(&h.conn(), original).unwrap();

    // The output hash collides with the proxy, after the operation was journaled.
    let err = h
        .process(
            OperationType::Transcode,
            json!({"original_sha1": sha(2), "file_name": "t.mp4", "sha1": sha(3), "size": 5}),
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("Handle operation transcode"));

    let conn = h.conn();
    let transcodes: i64 = conn
        .query_row("SELECT COUNT(*) FROM operations WHERE type = 'transcode'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(transcodes, 0);
    let queued = batch_convert::get(&conn, h_file_id(&conn, 2)).unwrap().unwrap();
    assert_eq!(queued.operation_id, None);
    assert!(h.sink.events().is_empty());
}

#[test]
fn test_replacing_last_published_file_unpublishes_unit() {
    let h = TestHarness::new();
    h.capture("wf-i", "cap-i", 1);
    h.demux(1, 2);
    h.send(2, lesson_part(1)).unwrap();
    h.ok(OperationType::Upload, json!({"file_name": "p3.mp4", "sha1": sha(3), "url": "u"}));
    let unit = h.unit_of(3);
    assert!(unit.published);

    let events = h.ok(
        OperationType::Insert,
        json!({
            "mode": "update",
            "insert_type": "aricha",
            "content_unit_uid": unit.uid,
            "old_sha1": sha(3),
            "file_name": "p3_fixed.mp4",
            "sha1": sha(30)
        }),
    );

    let old = h.file(3);
    let new = h.file(30);
    assert!(old.is_removed());
    assert_eq!(new.content_unit_id, Some(unit.id));
    assert_eq!(
        events,
        vec![
            DomainEvent::file_replaced(&old, &new, Some("aricha")),
            DomainEvent::file_removed(&old),
            DomainEvent::unit_updated(&unit),
        ]
    );
    assert!(!h.unit_of(30).published);
}

#[test]
fn test_insert_rename_then_duplicate() {
    let h = TestHarness::new();
    h.capture("wf-r", "cap-r", 1);
    h.demux(1, 2);
    h.send(2, lesson_part(1)).unwrap();
    let unit = h.unit_of(2);

    let insert = |mode: &str, name: &str| {
        h.process(
            OperationType::Insert,
            json!({
                "mode": mode,
                "insert_type": "akladot",
                "content_unit_uid": unit.uid,
                "file_name": name,
                "sha1": sha(40)
            }),
        )
    };

    insert("new", "notes.doc").unwrap();
    let err = insert("new", "notes.doc").unwrap_err();
    assert!(err.is_validation());

    let out = insert("rename", "notes_v2.doc").unwrap();
    let file = h.file(40);
    assert_eq!(file.name, "notes_v2.doc");
    assert_eq!(file.file_type.as_deref(), Some("text"));
    assert_eq!(out.events, vec![DomainEvent::file_updated(&file)]);
}
