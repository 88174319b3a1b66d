//! Content unit creation and catalog associations.

use mdb_common::{
    CatalogId, ContentUnitId, ContentUnitType, FileId, PersonRole, Properties, Result, ResultExt,
};
use mdb_db::models::{CatalogKind, ContentUnit};
use mdb_db::queries::{catalog, content_units, files};
use rusqlite::Connection;

use crate::registry::{Registry, LANG_MULTI, LANG_UNKNOWN};
use crate::requests::CitMetadata;

pub struct UnitBuilder<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> UnitBuilder<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    pub fn create_unit(&self, unit_type: ContentUnitType, props: &Properties) -> Result<ContentUnit> {
        let unit = content_units::create_content_unit(self.conn, unit_type, props)
            .with_context(|| format!("Create {} content unit", unit_type))?;
        tracing::info!(uid = %unit.uid, "Created content unit of type {}", unit_type);
        Ok(unit)
    }

    pub fn get(&self, id: ContentUnitId) -> Result<ContentUnit> {
        content_units::get_content_unit(self.conn, id)
    }

    /// Point every file at `unit`.
    pub fn attach_files(&self, unit: &ContentUnit, ids: &[FileId]) -> Result<()> {
        let n = files::set_content_unit(self.conn, ids, unit.id)
            .with_context(|| format!("Attach files to unit {}", unit.uid))?;
        tracing::debug!("Attached {} files to unit {}", n, unit.uid);
        Ok(())
    }

    /// Link sources by UID. Unknown UIDs are logged and skipped.
    pub fn attach_sources(&self, unit: &ContentUnit, uids: &[String]) -> Result<usize> {
        self.attach_catalog(unit, CatalogKind::Source, uids)
    }

    /// Link tags by UID. Unknown UIDs are logged and skipped.
    pub fn attach_tags(&self, unit: &ContentUnit, uids: &[String]) -> Result<usize> {
        self.attach_catalog(unit, CatalogKind::Tag, uids)
    }

    fn attach_catalog(&self, unit: &ContentUnit, kind: CatalogKind, uids: &[String]) -> Result<usize> {
        if uids.is_empty() {
            return Ok(0);
        }
        let resolved = catalog::resolve_by_uid(self.conn, kind, uids)?;
        for missing in &resolved.missing {
            tracing::warn!("Unknown {} {}, not linked to unit {}", kind, missing, unit.uid);
        }
        let ids: Vec<CatalogId> = resolved.found.iter().map(|e| e.id).collect();
        content_units::add_catalog_links(self.conn, unit.id, kind, &ids)
            .with_context(|| format!("Link {}s to unit {}", kind, unit.uid))?;
        Ok(ids.len())
    }

    /// Associate the named lecturer, if the name matches a known pattern.
    pub fn attach_lecturer(&self, unit: &ContentUnit, name: Option<&str>) -> Result<bool> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(false);
        };
        match self.registry.lecturer(name) {
            Some(person) => {
                content_units::add_person(self.conn, unit.id, person, PersonRole::Lecturer)?;
                Ok(true)
            }
            None => {
                tracing::debug!("No person matches lecturer {}", name);
                Ok(false)
            }
        }
    }

    pub fn merge_properties(&self, unit: &mut ContentUnit, patch: &Properties) -> Result<bool> {
        let mut props = unit.properties.clone();
        if !props.merge(patch) {
            return Ok(false);
        }
        unit.properties = content_units::merge_properties(self.conn, unit.id, patch)?;
        Ok(true)
    }

    pub fn set_type(&self, unit: &mut ContentUnit, unit_type: ContentUnitType) -> Result<bool> {
        if unit.unit_type == unit_type {
            return Ok(false);
        }
        tracing::info!("Changing type of unit {} from {} to {}", unit.uid, unit.unit_type, unit_type);
        content_units::set_type(self.conn, unit.id, unit_type)?;
        unit.unit_type = unit_type;
        Ok(true)
    }

    pub fn publish(&self, unit: &mut ContentUnit) -> Result<bool> {
        if unit.published {
            return Ok(false);
        }
        content_units::set_published(self.conn, unit.id, true)?;
        unit.published = true;
        Ok(true)
    }

    /// Drop source, tag and person links so they can be attached afresh.
    pub fn clear_associations(&self, unit: &ContentUnit) -> Result<()> {
        content_units::clear_associations(self.conn, unit.id)
    }

    /// Language of the unit's original material.
    pub fn original_language(&self, meta: &CitMetadata) -> String {
        if meta.has_translation {
            return LANG_MULTI.to_string();
        }
        let lang = self.registry.std_lang(&meta.language);
        if lang == LANG_UNKNOWN {
            tracing::warn!("Unknown language in metadata: {:?}", meta.language);
        }
        lang.to_string()
    }
}
