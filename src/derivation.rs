//! Linking derived units to their main unit.
//!
//! Derived artifacts (source excerpts, research material) and the main unit
//! of a recording are cut from the same parent file but may be sent in any
//! order. A derived unit that arrives first parks its `artifact_type` on
//! itself; the main unit adopts every parked sibling when it shows up.

use mdb_common::{ContentUnitId, FileId, Properties, Result, ResultExt};
use mdb_db::models::{ContentUnit, File};
use mdb_db::queries::{content_units, files};
use rusqlite::Connection;

/// Property marking a derived unit still waiting for its main unit.
pub const ARTIFACT_TYPE: &str = "artifact_type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The original file has no parent, nothing to link against.
    NoParent,
    /// Main unit adopted these parked derived units.
    Adopted(Vec<ContentUnitId>),
    /// Derived unit linked under this main unit.
    Linked(ContentUnitId),
    /// Derived unit parked until its main unit arrives.
    Parked,
}

pub struct DerivationLinker<'a> {
    conn: &'a Connection,
}

impl<'a> DerivationLinker<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Link `unit`, described by the artifact type of its `original` file,
    /// with its main or derived siblings.
    pub fn link(
        &self,
        original: &File,
        unit: &ContentUnit,
        artifact_type: Option<&str>,
    ) -> Result<LinkOutcome> {
        let Some(parent_id) = original.parent_id else {
            tracing::warn!("Original {} has no parent file, skipping derived units association", original.uid);
            return Ok(LinkOutcome::NoParent);
        };

        match artifact_type {
            None => self.adopt_parked(parent_id, unit),
            Some(artifact_type) => {
                let parent = files::get_file(self.conn, parent_id).context("Load original's parent")?;
                self.link_derived(&parent, unit, artifact_type)
            }
        }
    }

    fn adopt_parked(&self, parent_id: FileId, unit: &ContentUnit) -> Result<LinkOutcome> {
        let pending = files::pending_derived_siblings(self.conn, parent_id, unit.id)
            .context("Load derived content units")?;
        tracing::info!("{} derived units pending association with {}", pending.len(), unit.uid);

        let mut adopted = Vec::with_capacity(pending.len());
        for (derived, name) in pending {
            content_units::add_derivation(self.conn, unit.id, derived, &name)
                .context("Save derived unit association")?;
            content_units::remove_property(self.conn, derived, ARTIFACT_TYPE)
                .context("Clear derived unit artifact_type")?;
            adopted.push(derived);
        }
        Ok(LinkOutcome::Adopted(adopted))
    }

    fn link_derived(&self, parent: &File, unit: &ContentUnit, artifact_type: &str) -> Result<LinkOutcome> {
        match parent.content_unit_id.filter(|id| *id != unit.id) {
            Some(main) => {
                tracing::info!("Main content unit {} exists, linking {}", main, unit.uid);
                content_units::add_derivation(self.conn, main, unit.id, artifact_type)
                    .context("Save source unit association")?;
                Ok(LinkOutcome::Linked(main))
            }
            None => {
                tracing::info!("Main content unit not found, parking artifact_type on {}", unit.uid);
                content_units::merge_properties(
                    self.conn,
                    unit.id,
                    &Properties::new().with(ARTIFACT_TYPE, artifact_type),
                )?;
                Ok(LinkOutcome::Parked)
            }
        }
    }
}
