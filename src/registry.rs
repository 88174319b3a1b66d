//! Read-only lookup tables built once at startup.
//!
//! The [`Registry`] bundles language normalization, media type detection,
//! lecturer name patterns and event part labels. It is immutable after
//! construction and shared by reference with every component.

use std::collections::HashMap;

use mdb_common::{CatalogId, Result};
use mdb_db::queries::catalog;
use rusqlite::Connection;

use crate::config::RegistryConfig;

/// Language of content carrying simultaneous translation.
pub const LANG_MULTI: &str = "zz";
/// Language that could not be recognized.
pub const LANG_UNKNOWN: &str = "xx";

/// (code, ISO 639-2 code, English name)
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("en", "eng", "english"),
    ("he", "heb", "hebrew"),
    ("ru", "rus", "russian"),
    ("es", "spa", "spanish"),
    ("it", "ita", "italian"),
    ("de", "ger", "german"),
    ("nl", "dut", "dutch"),
    ("fr", "fre", "french"),
    ("pt", "por", "portuguese"),
    ("tr", "tur", "turkish"),
    ("pl", "pol", "polish"),
    ("ar", "ara", "arabic"),
    ("hu", "hun", "hungarian"),
    ("fi", "fin", "finnish"),
    ("lt", "lit", "lithuanian"),
    ("ja", "jpn", "japanese"),
    ("bg", "bul", "bulgarian"),
    ("ka", "geo", "georgian"),
    ("no", "nor", "norwegian"),
    ("sv", "swe", "swedish"),
    ("hr", "hrv", "croatian"),
    ("zh", "chi", "chinese"),
    ("fa", "per", "persian"),
    ("ro", "rum", "romanian"),
    ("hi", "hin", "hindi"),
    ("ua", "ukr", "ukrainian"),
    ("mk", "mac", "macedonian"),
    ("sl", "slv", "slovenian"),
    ("lv", "lav", "latvian"),
    ("sk", "slo", "slovak"),
    ("cs", "cze", "czech"),
];

/// A known media format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub file_type: &'static str,
}

const MEDIA_TYPES: &[MediaType] = &[
    MediaType { extension: "mp4", mime_type: "video/mp4", file_type: "video" },
    MediaType { extension: "wmv", mime_type: "video/x-ms-wmv", file_type: "video" },
    MediaType { extension: "flv", mime_type: "video/x-flv", file_type: "video" },
    MediaType { extension: "mov", mime_type: "video/quicktime", file_type: "video" },
    MediaType { extension: "mp3", mime_type: "audio/mpeg", file_type: "audio" },
    MediaType { extension: "wav", mime_type: "audio/x-wav", file_type: "audio" },
    MediaType { extension: "jpg", mime_type: "image/jpeg", file_type: "image" },
    MediaType { extension: "png", mime_type: "image/png", file_type: "image" },
    MediaType { extension: "zip", mime_type: "application/zip", file_type: "image" },
    MediaType { extension: "doc", mime_type: "application/msword", file_type: "text" },
    MediaType {
        extension: "docx",
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        file_type: "text",
    },
    MediaType { extension: "pdf", mime_type: "application/pdf", file_type: "text" },
    MediaType { extension: "html", mime_type: "text/html", file_type: "text" },
];

#[derive(Debug, Clone)]
pub struct Registry {
    languages: HashMap<String, String>,
    lecturers: Vec<(String, CatalogId)>,
    event_part_labels: Vec<String>,
    part_type_offset: i64,
}

impl Registry {
    /// Registry without lecturers.
    pub fn new(cfg: &RegistryConfig) -> Self {
        let mut languages = HashMap::new();
        for (code, iso3, name) in LANGUAGES {
            languages.insert(code.to_string(), code.to_string());
            languages.insert(iso3.to_string(), code.to_string());
            languages.insert(name.to_string(), code.to_string());
        }
        for (alias, code) in &cfg.language_aliases {
            languages.insert(alias.to_lowercase(), code.to_lowercase());
        }

        Self {
            languages,
            lecturers: Vec::new(),
            event_part_labels: cfg.event_part_labels.clone(),
            part_type_offset: cfg.part_type_offset,
        }
    }

    /// Registry with lecturer patterns read from the persons catalog.
    pub fn load(conn: &Connection, cfg: &RegistryConfig) -> Result<Self> {
        let mut registry = Self::new(cfg);
        registry.lecturers = catalog::lecturer_patterns(conn)?;
        tracing::debug!("Registry loaded {} lecturer patterns", registry.lecturers.len());
        Ok(registry)
    }

    #[must_use]
    pub fn with_lecturer(mut self, pattern: &str, person: CatalogId) -> Self {
        self.lecturers.push((pattern.to_lowercase(), person));
        self
    }

    /// Normalize a language code or name. Unknown input maps to [`LANG_UNKNOWN`].
    pub fn std_lang(&self, raw: &str) -> &str {
        self.languages
            .get(&raw.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(LANG_UNKNOWN)
    }

    pub fn media_type_by_mime(&self, mime: &str) -> Option<&'static MediaType> {
        let mime = mime.trim().to_lowercase();
        MEDIA_TYPES.iter().find(|m| m.mime_type == mime)
    }

    pub fn media_type_by_extension(&self, ext: &str) -> Option<&'static MediaType> {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        MEDIA_TYPES.iter().find(|m| m.extension == ext)
    }

    /// File type from the mime type, falling back to the file name extension.
    pub fn file_type_for(&self, mime: Option<&str>, file_name: &str) -> Option<&'static str> {
        mime.and_then(|m| self.media_type_by_mime(m))
            .or_else(|| {
                file_name
                    .rsplit_once('.')
                    .and_then(|(_, ext)| self.media_type_by_extension(ext))
            })
            .map(|m| m.file_type)
    }

    /// Person matching a lecturer name, compared case-insensitively.
    pub fn lecturer(&self, name: &str) -> Option<CatalogId> {
        let name = name.trim().to_lowercase();
        self.lecturers
            .iter()
            .find(|(pattern, _)| *pattern == name)
            .map(|(_, id)| *id)
    }

    /// Slot name prefix for an event part type code.
    ///
    /// Codes below the offset have no prefix. Codes past the end of the label
    /// table are logged and get no prefix either.
    pub fn event_part_label(&self, part_type: i64) -> Option<&str> {
        if part_type < self.part_type_offset {
            return None;
        }
        let idx = (part_type - self.part_type_offset) as usize;
        match self.event_part_labels.get(idx) {
            Some(label) => Some(label.as_str()),
            None => {
                tracing::warn!("Unknown event part type: {}", part_type);
                None
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}
