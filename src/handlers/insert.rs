//! Files inserted by archive operators.
//!
//! Modes: `new` adds a file, `update` adds a file replacing an older one,
//! `rename` rewrites the attributes of a previously inserted file.

use mdb_common::{ContentUnitType, Error, OperationType, Properties, Result, ResultExt};
use mdb_db::models::{CatalogKind, ContentUnit, File};
use mdb_db::queries::{catalog, content_units, files};

use super::impact::remove_file;
use super::{HandlerContext, HandlerOutput};
use crate::events::DomainEvent;
use crate::lineage::LineageTracker;
use crate::requests::{InsertMode, InsertRequest};
use crate::units::UnitBuilder;

/// File type implied by an insert type when the request has none.
fn default_file_type(insert_type: &str) -> Option<&'static str> {
    match insert_type {
        "akladot" | "tamlil" | "kitei-makor" | "article" => Some("text"),
        "sirtutim" | "publication" => Some("image"),
        "aricha" => Some("video"),
        _ => None,
    }
}

/// Derived unit type that files of `insert_type` belong to.
fn derived_unit_type(insert_type: &str) -> Option<ContentUnitType> {
    match insert_type {
        "kitei-makor" => Some(ContentUnitType::KiteiMakor),
        "research-material" => Some(ContentUnitType::ResearchMaterial),
        _ => None,
    }
}

pub(super) fn handle_insert(ctx: &HandlerContext<'_>, r: InsertRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);

    let existing = lineage.find_optional(&r.file.file.sha1).context("Lookup file")?;
    if r.mode == InsertMode::New && existing.is_some() {
        return Err(Error::validation(format!("File already exist: {}", r.file.file.sha1)));
    }
    if r.mode == InsertMode::Rename && existing.is_none() {
        return Err(Error::not_found(format!("file with sha1 {} to rename", r.file.file.sha1)));
    }

    let mut op_files: Vec<File> = Vec::new();
    let mut old_file = None;
    if r.mode == InsertMode::Update {
        let old_sha1 = r
            .old_sha1
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::validation("insert update: old_sha1 is required"))?;
        let old = lineage.find_by_sha1(old_sha1).context("Old file not found")?;
        op_files.push(old.clone());
        old_file = Some(old);
    }

    let unit = content_units::find_by_uid(ctx.conn, &r.content_unit_uid)
        .context("Fetch unit")?
        .ok_or_else(|| Error::not_found(format!("content unit {}", r.content_unit_uid)))?;
    tracing::info!("Found content unit {}", unit.uid);

    let parent = match r.parent_sha1.as_deref().filter(|s| !s.is_empty()) {
        Some(sha1) => {
            let found = lineage.find_optional(sha1)?;
            match &found {
                Some(p) => op_files.push(p.clone()),
                None => tracing::warn!("Parent file not found [{}]", sha1),
            }
            found
        }
        None => None,
    };

    let props = Properties::new()
        .with("insert_type", r.insert_type.as_str())
        .with("mode", r.mode.as_str());
    let op = ctx.create_operation(OperationType::Insert, &r.operation, props)?;

    let mut attrs = r.file.file.clone();
    if attrs.file_type.as_deref().map_or(true, str::is_empty) {
        attrs.file_type = default_file_type(&r.insert_type).map(str::to_string);
    }
    let duration = r.file.duration.filter(|d| *d > 0.0);
    let file_props = Properties::new()
        .with_opt("duration", duration)
        .with_opt("video_size", r.file.video_size.clone().filter(|s| !s.is_empty()));

    let mut file = match existing {
        Some(existing) if r.mode == InsertMode::Rename => {
            tracing::info!("Renaming existing file {}", existing.uid);
            lineage
                .update(&existing, parent.as_ref(), &attrs, &file_props)
                .context("Update file")?
        }
        _ => lineage.create(parent.as_ref(), &attrs, file_props)?,
    };

    let target = target_unit(ctx, &r, unit, &file)?;
    tracing::info!("Associating file {} to content unit {}", file.uid, target.uid);
    files::set_content_unit(ctx.conn, &[file.id], target.id).context("Save file content unit")?;
    file.content_unit_id = Some(target.id);

    let mut events = Vec::new();
    match r.mode {
        InsertMode::New => events.push(DomainEvent::file_inserted(&file, Some(&r.insert_type))),
        InsertMode::Rename => events.push(DomainEvent::file_updated(&file)),
        InsertMode::Update => {
            if let Some(old) = old_file.as_mut() {
                events.push(DomainEvent::file_replaced(old, &file, Some(&r.insert_type)));
                let impact = remove_file(ctx.conn, old)
                    .with_context(|| format!("Remove old file {}", old.uid))?;
                events.extend(impact);
            }
        }
    }

    // Units not created through a send get their duration from the first file.
    if let Some(duration) = duration {
        if files::files_of_unit(ctx.conn, target.id)?.len() == 1 {
            let mut target = target;
            UnitBuilder::new(ctx.conn, ctx.registry)
                .merge_properties(&mut target, &Properties::new().with("duration", duration.trunc() as i64))
                .with_context(|| format!("Update unit {} properties", target.uid))?;
            events.push(DomainEvent::unit_updated(&target));
        }
    }

    op_files.push(file);
    let linked: Vec<&File> = op_files.iter().collect();
    ctx.link_files(&op, &linked)?;
    Ok(HandlerOutput::new(op, events))
}

/// The unit an inserted file belongs to: the named unit itself, or a derived
/// unit of it for source excerpts, research material and publications.
fn target_unit(ctx: &HandlerContext<'_>, r: &InsertRequest, unit: ContentUnit, file: &File) -> Result<ContentUnit> {
    let builder = UnitBuilder::new(ctx.conn, ctx.registry);

    if let Some(unit_type) = derived_unit_type(&r.insert_type) {
        if let Some(derived) = content_units::find_derived_by_type(ctx.conn, unit.id, unit_type)? {
            tracing::info!("{} derived unit exists: {}", unit_type, derived.uid);
            return Ok(derived);
        }
        tracing::info!("{} derived unit doesn't exist, creating", unit_type);
        let derived = builder
            .create_unit(unit_type, &Properties::new())
            .with_context(|| format!("Create {} derived unit", unit_type))?;
        content_units::add_derivation(ctx.conn, unit.id, derived.id, unit_type.as_str())
            .context("Save derivation")?;
        return Ok(derived);
    }

    if r.insert_type == "publication" {
        let publisher_uid = r
            .publisher_uid
            .as_deref()
            .ok_or_else(|| Error::validation("publication insert: publisher_uid is required"))?;
        let publisher = catalog::get_by_uid(ctx.conn, CatalogKind::Publisher, publisher_uid)
            .context("Fetch publisher")?;

        if let Some(publication) = content_units::find_publication(ctx.conn, unit.id, publisher.id)? {
            tracing::info!("PUBLICATION derived unit exists: {}", publication.uid);
            return Ok(publication);
        }
        tracing::info!("PUBLICATION derived unit doesn't exist, creating");
        let props = Properties::new().with_opt("original_language", file.language.clone());
        let publication = builder
            .create_unit(ContentUnitType::Publication, &props)
            .context("Create PUBLICATION derived unit")?;
        content_units::add_catalog_links(ctx.conn, publication.id, CatalogKind::Publisher, &[publisher.id])
            .context("Associate publisher")?;
        content_units::add_derivation(
            ctx.conn,
            unit.id,
            publication.id,
            ContentUnitType::Publication.as_str(),
        )
        .context("Save derivation")?;
        return Ok(publication);
    }

    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{run, setup, sha};
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn insert(mode: &str, insert_type: &str, unit_uid: &str, n: u32, extra: serde_json::Value) -> serde_json::Value {
        let mut payload = json!({
            "mode": mode,
            "insert_type": insert_type,
            "content_unit_uid": unit_uid,
            "file_name": format!("insert-{}.pdf", n),
            "sha1": sha(n),
            "size": 10
        });
        if let (Some(p), Some(e)) = (payload.as_object_mut(), extra.as_object()) {
            p.extend(e.clone());
        }
        payload
    }

    #[test]
    fn test_insert_new_attaches_to_unit() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::LessonPart, &Properties::new()).unwrap();

        let out = run(&conn, &registry, OperationType::Insert, insert("new", "tamlil", &unit.uid, 1, json!({}))).unwrap();
        let file = files::find_by_sha1(&conn, &sha(1)).unwrap().unwrap();
        assert_eq!(file.content_unit_id, Some(unit.id));
        assert_eq!(file.file_type.as_deref(), Some("text"));
        assert_eq!(out.events, vec![DomainEvent::file_inserted(&file, Some("tamlil"))]);

        let err = run(&conn, &registry, OperationType::Insert, insert("new", "tamlil", &unit.uid, 1, json!({}))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_insert_unknown_unit() {
        let (conn, registry) = setup();
        let err = run(&conn, &registry, OperationType::Insert, insert("new", "tamlil", "NOSUCHCU", 1, json!({}))).unwrap_err();
        assert!(err.is_not_found());
        assert_matches!(files::find_by_sha1(&conn, &sha(1)), Ok(None));
    }

    #[test]
    fn test_insert_update_requires_old_file() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::LessonPart, &Properties::new()).unwrap();
        let err = run(
            &conn,
            &registry,
            OperationType::Insert,
            insert("update", "tamlil", &unit.uid, 2, json!({"old_sha1": sha(5)})),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_insert_update_replaces_old_file() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::LessonPart, &Properties::new()).unwrap();
        run(&conn, &registry, OperationType::Insert, insert("new", "tamlil", &unit.uid, 1, json!({}))).unwrap();

        let out = run(
            &conn,
            &registry,
            OperationType::Insert,
            insert("update", "tamlil", &unit.uid, 2, json!({"old_sha1": sha(1)})),
        )
        .unwrap();

        let old = files::find_by_sha1(&conn, &sha(1)).unwrap().unwrap();
        let new = files::find_by_sha1(&conn, &sha(2)).unwrap().unwrap();
        assert!(old.is_removed());
        assert_eq!(out.events[0], DomainEvent::file_replaced(&old, &new, Some("tamlil")));
        assert_eq!(out.events[1], DomainEvent::file_removed(&old));
    }

    #[test]
    fn test_insert_rename_rewrites_file() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::LessonPart, &Properties::new()).unwrap();
        run(&conn, &registry, OperationType::Insert, insert("new", "tamlil", &unit.uid, 1, json!({}))).unwrap();

        let out = run(
            &conn,
            &registry,
            OperationType::Insert,
            insert("rename", "tamlil", &unit.uid, 1, json!({"file_name": "better.pdf", "language": "eng"})),
        )
        .unwrap();

        let file = files::find_by_sha1(&conn, &sha(1)).unwrap().unwrap();
        assert_eq!(file.name, "better.pdf");
        assert_eq!(file.language.as_deref(), Some("en"));
        assert_eq!(out.events, vec![DomainEvent::file_updated(&file)]);
    }

    #[test]
    fn test_insert_kitei_makor_reuses_derived_unit() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::LessonPart, &Properties::new()).unwrap();

        run(&conn, &registry, OperationType::Insert, insert("new", "kitei-makor", &unit.uid, 1, json!({}))).unwrap();
        run(&conn, &registry, OperationType::Insert, insert("new", "kitei-makor", &unit.uid, 2, json!({}))).unwrap();

        let edges = content_units::derivations_from(&conn, unit.id).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].name, "KITEI_MAKOR");
        let a = files::find_by_sha1(&conn, &sha(1)).unwrap().unwrap();
        let b = files::find_by_sha1(&conn, &sha(2)).unwrap().unwrap();
        assert_eq!(a.content_unit_id, Some(edges[0].derived_id));
        assert_eq!(b.content_unit_id, a.content_unit_id);
    }

    #[test]
    fn test_insert_publication_per_publisher() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::LessonPart, &Properties::new()).unwrap();
        catalog::create_entry(&conn, CatalogKind::Publisher, "PUB00001", "One").unwrap();
        catalog::create_entry(&conn, CatalogKind::Publisher, "PUB00002", "Two").unwrap();

        for (n, publisher) in [(1, "PUB00001"), (2, "PUB00001"), (3, "PUB00002")] {
            run(
                &conn,
                &registry,
                OperationType::Insert,
                insert("new", "publication", &unit.uid, n, json!({"publisher_uid": publisher, "language": "heb"})),
            )
            .unwrap();
        }

        let edges = content_units::derivations_from(&conn, unit.id).unwrap();
        assert_eq!(edges.len(), 2);
        let publication = content_units::get_content_unit(&conn, edges[0].derived_id).unwrap();
        assert_eq!(publication.unit_type, ContentUnitType::Publication);
        assert_eq!(publication.properties.get_str("original_language"), Some("he"));
    }

    #[test]
    fn test_insert_sets_duration_of_single_file_unit() {
        let (conn, registry) = setup();
        let unit = content_units::create_content_unit(&conn, ContentUnitType::Clip, &Properties::new()).unwrap();

        let out = run(
            &conn,
            &registry,
            OperationType::Insert,
            insert("new", "aricha", &unit.uid, 1, json!({"file_name": "clip.mp4", "duration": 93.7})),
        )
        .unwrap();

        let unit = content_units::get_content_unit(&conn, unit.id).unwrap();
        assert_eq!(unit.properties.get_i64("duration"), Some(93));
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[1], DomainEvent::unit_updated(&unit));
    }
}
