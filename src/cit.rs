//! Processing of Content Identification Tool metadata.
//!
//! A send carries the CIT description of an original/proxy pair. New mode
//! creates the content unit the pair belongs to; update mode rewrites the unit
//! the original already has. Both then reconcile the unit's collection and
//! link it with its main or derived siblings.

use mdb_common::{Error, FileId, Result, ResultExt};
use mdb_db::models::{ContentUnit, File};
use mdb_db::queries::files;
use rusqlite::Connection;

use crate::derivation::DerivationLinker;
use crate::events::DomainEvent;
use crate::lineage::LineageTracker;
use crate::reconcile::CollectionReconciler;
use crate::registry::Registry;
use crate::requests::CitMetadata;
use crate::units::UnitBuilder;

/// The unit a send resolved to, with the events it produced.
#[derive(Debug)]
pub struct CitOutcome {
    pub unit: ContentUnit,
    pub events: Vec<DomainEvent>,
}

pub struct CitProcessor<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> CitProcessor<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    /// Create the unit described by `meta` for a freshly sent pair.
    pub fn process_new(&self, meta: &CitMetadata, original: &mut File, proxy: &mut File) -> Result<CitOutcome> {
        tracing::info!("Processing CIT metadata for {}", original.uid);
        self.update_files(meta, original, proxy)?;

        let builder = UnitBuilder::new(self.conn, self.registry);
        let unit = builder.create_unit(meta.content_type, &meta.date_properties())?;
        let mut events = vec![DomainEvent::unit_created(&unit)];

        self.associate(meta, &unit, original, proxy, &mut events)?;
        Ok(CitOutcome { unit, events })
    }

    /// Rewrite the unit the original already belongs to.
    pub fn process_update(
        &self,
        meta: &CitMetadata,
        original: &mut File,
        proxy: &mut File,
    ) -> Result<CitOutcome> {
        tracing::info!("Processing CIT metadata update for {}", original.uid);
        let unit_id = original.content_unit_id.ok_or_else(|| {
            Error::not_found(format!("content unit of original file {}", original.uid))
        })?;
        self.update_files(meta, original, proxy)?;

        let builder = UnitBuilder::new(self.conn, self.registry);
        let mut unit = builder.get(unit_id).context("Lookup original's unit")?;
        builder.set_type(&mut unit, meta.content_type)?;
        builder.merge_properties(&mut unit, &meta.date_properties())?;
        builder.clear_associations(&unit).context("Clear unit associations")?;
        let mut events = vec![DomainEvent::unit_updated(&unit)];

        self.associate(meta, &unit, original, proxy, &mut events)?;
        Ok(CitOutcome { unit, events })
    }

    /// Stamp the dates on both files and the language on the original.
    fn update_files(&self, meta: &CitMetadata, original: &mut File, proxy: &mut File) -> Result<()> {
        let props = meta.date_properties();
        tracing::debug!("Updating files properties: {:?}", props);
        original.properties = files::merge_properties(self.conn, original.id, &props)?;
        proxy.properties = files::merge_properties(self.conn, proxy.id, &props)?;

        let builder = UnitBuilder::new(self.conn, self.registry);
        original.language = Some(builder.original_language(meta));
        files::update_file(self.conn, original).context("Save original language")
    }

    fn associate(
        &self,
        meta: &CitMetadata,
        unit: &ContentUnit,
        original: &mut File,
        proxy: &mut File,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        let builder = UnitBuilder::new(self.conn, self.registry);

        let mut ids: Vec<FileId> = vec![original.id, proxy.id];
        if meta.is_main() {
            let ancestors = LineageTracker::new(self.conn, self.registry)
                .ancestors(original.id)
                .context("Find original's ancestors")?;
            tracing::info!("Main unit, adding {} ancestors", ancestors.len());
            ids.extend(ancestors.iter().map(|f| f.id));
        }
        builder.attach_files(unit, &ids).context("Add files to unit")?;
        original.content_unit_id = Some(unit.id);
        proxy.content_unit_id = Some(unit.id);

        builder.attach_sources(unit, &meta.sources).context("Associate sources")?;
        builder.attach_tags(unit, &meta.tags).context("Associate tags")?;
        builder
            .attach_lecturer(unit, meta.lecturer.as_deref())
            .context("Associate persons")?;

        let reconciler = CollectionReconciler::new(self.conn, self.registry);
        if let Some(reconciled) = reconciler.reconcile(meta, original, &unit.properties)? {
            let mut touched = reconciled.updated;
            if meta.is_main() {
                reconciler.link(&reconciled.collection, unit, meta)?;
                touched = true;
            }
            if reconciled.created {
                events.push(DomainEvent::collection_created(&reconciled.collection));
            } else if touched {
                events.push(DomainEvent::collection_updated(&reconciled.collection));
            }
        }

        DerivationLinker::new(self.conn).link(original, unit, meta.derived_artifact())?;
        Ok(())
    }
}
