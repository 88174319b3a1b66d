//! Internal Rust models matching the database schema.
//!
//! Query functions return these plain values; relations are fetched through
//! explicit queries rather than attached to the models.

use chrono::{DateTime, Utc};
use mdb_common::{
    CatalogId, CollectionId, CollectionType, ContentUnitId, ContentUnitType, FileId, OperationId,
    OperationType, PersonRole, Properties, SecurityLevel,
};
use serde::{Deserialize, Serialize};

/// A physical file in the lineage forest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct File {
    pub id: FileId,
    pub uid: String,
    pub name: String,
    pub sha1: Option<String>,
    pub size: Option<i64>,
    pub file_type: Option<String>,
    pub sub_type: Option<String>,
    pub mime_type: Option<String>,
    pub language: Option<String>,
    pub parent_id: Option<FileId>,
    pub content_unit_id: Option<ContentUnitId>,
    pub properties: Properties,
    pub secure: SecurityLevel,
    pub published: bool,
    pub file_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl File {
    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }
}

/// Attributes of a file about to be inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewFile {
    pub name: String,
    pub sha1: Option<String>,
    pub size: Option<i64>,
    pub file_type: Option<String>,
    pub sub_type: Option<String>,
    pub mime_type: Option<String>,
    pub language: Option<String>,
    pub parent_id: Option<FileId>,
    pub properties: Properties,
    pub file_created_at: Option<DateTime<Utc>>,
}

/// A pipeline operation. Never modified after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub uid: String,
    pub op_type: OperationType,
    pub station: Option<String>,
    pub user_email: Option<String>,
    pub details: Option<String>,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

/// Attributes of an operation about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub op_type: OperationType,
    pub station: Option<String>,
    pub user_email: Option<String>,
    pub details: Option<String>,
    pub properties: Properties,
}

/// A content unit (lesson part, lecture, publication...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentUnit {
    pub id: ContentUnitId,
    pub uid: String,
    pub unit_type: ContentUnitType,
    pub published: bool,
    pub secure: SecurityLevel,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

/// Directed `source -> derived` edge between content units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContentUnitDerivation {
    pub source_id: ContentUnitId,
    pub derived_id: ContentUnitId,
    pub name: String,
}

/// A collection of content units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: CollectionId,
    pub uid: String,
    pub collection_type: CollectionType,
    pub published: bool,
    pub secure: SecurityLevel,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

/// Membership of a content unit in a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionContentUnit {
    pub collection_id: CollectionId,
    pub content_unit_id: ContentUnitId,
    pub name: String,
    pub position: i64,
}

/// Kind of catalog entry resolvable by UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Source,
    Tag,
    Person,
    Publisher,
}

impl CatalogKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Source => "sources",
            Self::Tag => "tags",
            Self::Person => "persons",
            Self::Publisher => "publishers",
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Tag => write!(f, "tag"),
            Self::Person => write!(f, "person"),
            Self::Publisher => write!(f, "publisher"),
        }
    }
}

/// A source, tag, person or publisher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: CatalogId,
    pub kind: CatalogKind,
    pub uid: String,
    pub name: String,
}

/// Person association of a content unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitPerson {
    pub person_id: CatalogId,
    pub role: PersonRole,
}

/// Row of the transcode queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConvert {
    pub file_id: FileId,
    pub operation_id: Option<OperationId>,
    pub request_at: DateTime<Utc>,
}
