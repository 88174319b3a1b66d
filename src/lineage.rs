//! File lineage: creating files, linking them to parents, walking ancestry.

use std::collections::HashMap;

use chrono::Utc;
use mdb_common::sha1::normalize_sha1;
use mdb_common::{ContentUnitId, ContentUnitType, Error, FileId, Properties, Result, ResultExt};
use mdb_db::models::{File, NewFile};
use mdb_db::queries::files;
use rusqlite::Connection;

use crate::registry::Registry;
use crate::requests::FileAttrs;

pub struct LineageTracker<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> LineageTracker<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    /// File with the given hash. A missing file is an error.
    pub fn find_by_sha1(&self, sha1: &str) -> Result<File> {
        self.find_optional(sha1)?
            .ok_or_else(|| Error::not_found(format!("file with sha1 {}", sha1)))
    }

    pub fn find_optional(&self, sha1: &str) -> Result<Option<File>> {
        let sha1 = normalize_sha1(sha1)?;
        files::find_by_sha1(self.conn, &sha1)
    }

    pub fn get(&self, id: FileId) -> Result<File> {
        files::get_file(self.conn, id)
    }

    /// Create a file, optionally as a child of `parent`.
    pub fn create(&self, parent: Option<&File>, attrs: &FileAttrs, props: Properties) -> Result<File> {
        let new = NewFile {
            name: attrs.file_name.clone(),
            sha1: Some(normalize_sha1(&attrs.sha1)?),
            size: attrs.size,
            file_type: self.file_type(attrs),
            sub_type: attrs.sub_type.clone(),
            mime_type: attrs.mime_type.clone(),
            language: self.language(attrs),
            parent_id: parent.map(|p| p.id),
            properties: props,
            file_created_at: attrs.created_at,
        };

        let file = files::create_file(self.conn, &new)
            .with_context(|| format!("Create file {}", attrs.file_name))?;
        tracing::debug!(uid = %file.uid, parent = ?file.parent_id, "Created file {}", file.name);
        Ok(file)
    }

    /// Create a file that has no content hash yet (a capture in progress).
    pub fn create_unhashed(&self, name: &str, props: Properties) -> Result<File> {
        let new = NewFile {
            name: name.to_string(),
            properties: props,
            ..Default::default()
        };
        files::create_file(self.conn, &new).with_context(|| format!("Create file {}", name))
    }

    /// Overwrite the reported attributes of `file`, re-parent it under
    /// `parent` and merge `props` into its properties.
    pub fn update(
        &self,
        file: &File,
        parent: Option<&File>,
        attrs: &FileAttrs,
        props: &Properties,
    ) -> Result<File> {
        if let Some(parent) = parent {
            self.check_parent(file.id, parent.id)?;
        }

        // Attributes absent from the report keep their stored values.
        let mut updated = file.clone();
        updated.name = attrs.file_name.clone();
        updated.sha1 = Some(normalize_sha1(&attrs.sha1)?);
        updated.size = attrs.size.or(file.size);
        updated.file_type = self.file_type(attrs).or_else(|| file.file_type.clone());
        updated.sub_type = attrs.sub_type.clone().or_else(|| file.sub_type.clone());
        updated.mime_type = attrs.mime_type.clone().or_else(|| file.mime_type.clone());
        updated.language = self.language(attrs).or_else(|| file.language.clone());
        updated.parent_id = parent.map(|p| p.id);
        updated.file_created_at = attrs.created_at.or(file.file_created_at);
        updated.properties.merge(props);

        files::update_file(self.conn, &updated)
            .with_context(|| format!("Update file {}", file.uid))?;
        Ok(updated)
    }

    /// Rename a file. Returns `false` when the name is unchanged.
    pub fn rename(&self, file: &mut File, name: &str) -> Result<bool> {
        if file.name == name {
            return Ok(false);
        }
        tracing::info!("Renaming file {} from {} to {}", file.uid, file.name, name);
        file.name = name.to_string();
        files::update_file(self.conn, file).with_context(|| format!("Rename file {}", file.uid))?;
        Ok(true)
    }

    /// Clear the removal marker. Returns `false` if the file was not removed.
    pub fn resurrect(&self, file: &mut File) -> Result<bool> {
        if !file.is_removed() {
            return Ok(false);
        }
        tracing::info!("Restoring removed file {}", file.uid);
        files::set_removed_at(self.conn, file.id, None)?;
        file.removed_at = None;
        Ok(true)
    }

    pub fn soft_remove(&self, file: &mut File) -> Result<()> {
        let now = Utc::now();
        files::set_removed_at(self.conn, file.id, Some(now))?;
        file.removed_at = Some(now);
        Ok(())
    }

    /// Ancestors of a file, parent first, root last.
    pub fn ancestors(&self, id: FileId) -> Result<Vec<File>> {
        files::ancestors(self.conn, id)
    }

    pub fn parent(&self, file: &File) -> Result<Option<File>> {
        file.parent_id.map(|id| self.get(id)).transpose()
    }

    pub fn children(&self, id: FileId) -> Result<Vec<File>> {
        files::children(self.conn, id)
    }

    /// Units attached to the file or its descendants, excluding publications.
    pub fn descendant_units(&self, id: FileId) -> Result<Vec<ContentUnitId>> {
        files::descendant_unit_ids(self.conn, id, &[ContentUnitType::Publication])
    }

    fn check_parent(&self, child: FileId, parent: FileId) -> Result<()> {
        if child == parent {
            return Err(Error::validation(format!("file {} cannot be its own parent", child)));
        }
        if self.ancestors(parent)?.iter().any(|f| f.id == child) {
            return Err(Error::validation(format!(
                "file {} is an ancestor of {}, re-parenting would create a cycle",
                child, parent
            )));
        }
        Ok(())
    }

    fn file_type(&self, attrs: &FileAttrs) -> Option<String> {
        attrs
            .file_type
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.registry
                    .file_type_for(attrs.mime_type.as_deref(), &attrs.file_name)
                    .map(str::to_string)
            })
    }

    fn language(&self, attrs: &FileAttrs) -> Option<String> {
        attrs
            .language
            .as_deref()
            .filter(|l| !l.is_empty())
            .map(|l| self.registry.std_lang(l).to_string())
    }
}

/// Collapse entries sharing a hash. The last reported entry wins and keeps
/// the position where its hash first appeared.
pub fn dedup_by_sha1<T, F>(items: &[T], sha1: F) -> Vec<&T>
where
    F: Fn(&T) -> &str,
{
    let mut order: Vec<String> = Vec::new();
    let mut last: HashMap<String, usize> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        let key = sha1(item).trim().to_ascii_lowercase();
        if last.insert(key.clone(), i).is_none() {
            order.push(key);
        }
    }
    order.iter().map(|k| &items[last[k]]).collect()
}
