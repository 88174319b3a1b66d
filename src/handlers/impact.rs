//! Side effects of publishing and removing files on their unit and
//! collections.

use mdb_common::{Result, ResultExt, SecurityLevel};
use mdb_db::models::File;
use mdb_db::queries::{collections, content_units, files};
use rusqlite::Connection;

use crate::events::DomainEvent;

/// Publish a file. A public file also publishes its unit and the unit's
/// collections. Returns the events for everything that became published.
pub fn publish_file(conn: &Connection, file: &mut File) -> Result<Vec<DomainEvent>> {
    let mut events = Vec::new();
    if !file.published {
        file.published = true;
        files::update_file(conn, file).context("Publish file")?;
    }
    events.push(DomainEvent::file_published(file));

    if file.secure != SecurityLevel::Public {
        tracing::debug!("File {} is not public, unit stays as is", file.uid);
        return Ok(events);
    }
    let Some(unit_id) = file.content_unit_id else {
        return Ok(events);
    };

    let unit = content_units::get_content_unit(conn, unit_id)?;
    if !unit.published {
        tracing::info!("Publishing content unit {}", unit.uid);
        content_units::set_published(conn, unit.id, true)?;
        events.push(DomainEvent::unit_published(&unit));
    }

    for collection in collections::collections_of_unit(conn, unit.id)? {
        if !collection.published {
            tracing::info!("Publishing collection {}", collection.uid);
            collections::set_published(conn, collection.id, true)?;
            events.push(DomainEvent::collection_published(&collection));
        }
    }
    Ok(events)
}

/// Soft-remove a file. A published unit left without any published file is
/// unpublished.
pub fn remove_file(conn: &Connection, file: &mut File) -> Result<Vec<DomainEvent>> {
    let mut events = Vec::new();
    if !file.is_removed() {
        let now = chrono::Utc::now();
        files::set_removed_at(conn, file.id, Some(now)).context("Remove file")?;
        file.removed_at = Some(now);
    }
    events.push(DomainEvent::file_removed(file));

    let Some(unit_id) = file.content_unit_id else {
        return Ok(events);
    };
    let unit = content_units::get_content_unit(conn, unit_id)?;
    if !unit.published {
        return Ok(events);
    }

    let still_published = files::files_of_unit(conn, unit.id)?
        .iter()
        .any(|f| f.published && !f.is_removed());
    if !still_published {
        tracing::info!("Unit {} has no published files left, unpublishing", unit.uid);
        content_units::set_published(conn, unit.id, false)?;
        events.push(DomainEvent::unit_updated(&unit));
    }
    Ok(events)
}
