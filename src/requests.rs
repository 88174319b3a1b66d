//! Typed payloads of inbound pipeline events.
//!
//! Every request carries the operation attributes (station, user, workflow
//! id) at its top level, next to the type specific fields.

use chrono::{DateTime, NaiveDate, Utc};
use mdb_common::{ContentUnitType, Error, OperationType, Properties, Result};
use mdb_db::models::NewOperation;
use serde::{Deserialize, Serialize};

/// Who performed an operation, and in which workflow.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OperationAttrs {
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

impl OperationAttrs {
    /// Operation row for these attributes. The workflow id, when present, is
    /// added to `props`.
    pub fn new_operation(&self, op_type: OperationType, props: Properties) -> NewOperation {
        NewOperation {
            op_type,
            station: self.station.clone(),
            user_email: self.user.clone(),
            details: None,
            properties: props.with_opt("workflow_id", self.workflow_id.clone()),
        }
    }
}

/// Physical attributes of a reported file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileAttrs {
    pub file_name: String,
    pub sha1: String,
    #[serde(default)]
    pub size: Option<i64>,
    /// Unix seconds.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// An audio/video file with its playback attributes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AvFile {
    #[serde(flatten)]
    pub file: FileAttrs,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub video_size: Option<String>,
}

impl AvFile {
    /// `duration` and `video_size` as file properties.
    pub fn properties(&self) -> Properties {
        Properties::new()
            .with_opt("duration", self.duration)
            .with_opt("video_size", self.video_size.clone().filter(|s| !s.is_empty()))
    }
}

/// A file referenced by hash together with its (possibly new) name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileRef {
    pub sha1: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptureStartRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub file_name: String,
    #[serde(default)]
    pub capture_source: Option<String>,
    #[serde(default)]
    pub collection_uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptureStopRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    #[serde(flatten)]
    pub file: AvFile,
    #[serde(default)]
    pub capture_source: Option<String>,
    /// Capture id shared by every part of the session.
    #[serde(default)]
    pub collection_uid: Option<String>,
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default)]
    pub label_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DemuxRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub sha1: String,
    pub original: AvFile,
    pub proxy: AvFile,
    #[serde(default)]
    pub capture_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrimRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub original_sha1: String,
    pub proxy_sha1: String,
    pub original: AvFile,
    pub proxy: AvFile,
    #[serde(default, rename = "in")]
    pub in_points: Vec<f64>,
    #[serde(default, rename = "out")]
    pub out_points: Vec<f64>,
    #[serde(default)]
    pub capture_source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    #[default]
    New,
    Update,
}

/// Content Identification Tool metadata attached to a send.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CitMetadata {
    pub content_type: ContentUnitType,
    pub capture_date: NaiveDate,
    #[serde(default)]
    pub week_date: Option<NaiveDate>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub has_translation: bool,
    #[serde(default)]
    pub lecturer: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub part: Option<i64>,
    #[serde(default)]
    pub part_type: Option<i64>,
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub artifact_type: Option<String>,
    #[serde(default)]
    pub collection_uid: Option<String>,
    #[serde(default)]
    pub final_name: Option<String>,
    #[serde(default)]
    pub manual_name: Option<String>,
    #[serde(default)]
    pub require_test: bool,
}

impl CitMetadata {
    /// Whether this describes a main artifact (no artifact type, or "main").
    pub fn is_main(&self) -> bool {
        self.derived_artifact().is_none()
    }

    /// Artifact type of a derived artifact.
    pub fn derived_artifact(&self) -> Option<&str> {
        self.artifact_type
            .as_deref()
            .filter(|t| !t.is_empty() && *t != "main")
    }

    /// The week date for weekly lessons, otherwise the capture date.
    pub fn film_date(&self) -> NaiveDate {
        self.week_date.unwrap_or(self.capture_date)
    }

    /// `capture_date` and `film_date` as properties.
    pub fn date_properties(&self) -> Properties {
        Properties::new()
            .with("capture_date", self.capture_date.to_string())
            .with("film_date", self.film_date().to_string())
    }

    /// Scalar fields as operation properties. List fields are left out.
    pub fn scalar_properties(&self) -> Properties {
        Properties::new()
            .with("content_type", self.content_type.as_str())
            .with("capture_date", self.capture_date.to_string())
            .with_opt("week_date", self.week_date.map(|d| d.to_string()))
            .with("language", self.language.as_str())
            .with("has_translation", self.has_translation)
            .with_opt("lecturer", self.lecturer.clone())
            .with_opt("number", self.number)
            .with_opt("part", self.part)
            .with_opt("part_type", self.part_type)
            .with_opt("episode", self.episode.clone())
            .with_opt("artifact_type", self.artifact_type.clone())
            .with_opt("collection_uid", self.collection_uid.clone())
            .with_opt("final_name", self.final_name.clone())
            .with_opt("manual_name", self.manual_name.clone())
            .with("require_test", self.require_test)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SendRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub original: FileRef,
    pub proxy: FileRef,
    pub metadata: CitMetadata,
    #[serde(default)]
    pub mode: SendMode,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConvertRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub sha1: String,
    #[serde(default)]
    pub output: Vec<AvFile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UploadRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    #[serde(flatten)]
    pub file: FileAttrs,
    pub url: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SirtutimRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    #[serde(flatten)]
    pub file: FileAttrs,
    #[serde(default)]
    pub original_sha1: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Add a file that does not exist yet.
    New,
    /// Add a file replacing `old_sha1`.
    Update,
    /// Rewrite the attributes of an existing file.
    Rename,
}

impl InsertMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Update => "update",
            Self::Rename => "rename",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InsertRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    #[serde(flatten)]
    pub file: AvFile,
    pub mode: InsertMode,
    pub insert_type: String,
    pub content_unit_uid: String,
    #[serde(default)]
    pub parent_sha1: Option<String>,
    #[serde(default)]
    pub old_sha1: Option<String>,
    #[serde(default)]
    pub publisher_uid: Option<String>,
}

/// Transcoder report: either the produced file or an error message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscodeRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub original_sha1: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TranscodeRequest {
    /// The error message, if this reports a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// The produced file. Name, hash and size are required.
    pub fn as_file(&self) -> Result<FileAttrs> {
        let file_name = self
            .file_name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::validation("transcode: file_name is required"))?;
        let sha1 = self
            .sha1
            .clone()
            .ok_or_else(|| Error::validation("transcode: sha1 is required"))?;
        let size = self
            .size
            .ok_or_else(|| Error::validation("transcode: size is required"))?;

        Ok(FileAttrs {
            file_name,
            sha1,
            size: Some(size),
            created_at: self.created_at,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JoinRequest {
    #[serde(flatten)]
    pub operation: OperationAttrs,
    pub original_shas: Vec<String>,
    pub proxy_shas: Vec<String>,
    pub original: AvFile,
    pub proxy: AvFile,
}

/// A parsed inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CaptureStart(CaptureStartRequest),
    CaptureStop(CaptureStopRequest),
    Demux(DemuxRequest),
    Trim(TrimRequest),
    Send(SendRequest),
    Convert(ConvertRequest),
    Upload(UploadRequest),
    Sirtutim(SirtutimRequest),
    Insert(InsertRequest),
    Transcode(TranscodeRequest),
    Join(JoinRequest),
}

fn decode<T: serde::de::DeserializeOwned>(op_type: OperationType, payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| Error::validation(format!("Invalid {} payload: {}", op_type, e)))
}

impl Request {
    /// Decode the payload of an event of type `op_type`.
    pub fn parse(op_type: OperationType, payload: serde_json::Value) -> Result<Self> {
        let request = match op_type {
            OperationType::CaptureStart => Self::CaptureStart(decode(op_type, payload)?),
            OperationType::CaptureStop => Self::CaptureStop(decode(op_type, payload)?),
            OperationType::Demux => Self::Demux(decode(op_type, payload)?),
            OperationType::Trim => Self::Trim(decode(op_type, payload)?),
            OperationType::Send => Self::Send(decode(op_type, payload)?),
            OperationType::Convert => Self::Convert(decode(op_type, payload)?),
            OperationType::Upload => Self::Upload(decode(op_type, payload)?),
            OperationType::Sirtutim => Self::Sirtutim(decode(op_type, payload)?),
            OperationType::Insert => Self::Insert(decode(op_type, payload)?),
            OperationType::Transcode => {
                let r: TranscodeRequest = decode(op_type, payload)?;
                if r.error_message().is_none() {
                    r.as_file()?;
                }
                Self::Transcode(r)
            }
            OperationType::Join => Self::Join(decode(op_type, payload)?),
        };
        Ok(request)
    }

    pub fn op_type(&self) -> OperationType {
        match self {
            Self::CaptureStart(_) => OperationType::CaptureStart,
            Self::CaptureStop(_) => OperationType::CaptureStop,
            Self::Demux(_) => OperationType::Demux,
            Self::Trim(_) => OperationType::Trim,
            Self::Send(_) => OperationType::Send,
            Self::Convert(_) => OperationType::Convert,
            Self::Upload(_) => OperationType::Upload,
            Self::Sirtutim(_) => OperationType::Sirtutim,
            Self::Insert(_) => OperationType::Insert,
            Self::Transcode(_) => OperationType::Transcode,
            Self::Join(_) => OperationType::Join,
        }
    }
}
