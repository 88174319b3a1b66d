use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database file. `~` is expanded.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mdb.sqlite")
}

fn default_pool_size() -> u32 {
    mdb_db::pool::DEFAULT_POOL_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Slot name prefixes for event parts, indexed by `part_type - part_type_offset`.
    #[serde(default = "default_event_part_labels")]
    pub event_part_labels: Vec<String>,

    /// Smallest part type code that carries a label prefix.
    #[serde(default = "default_part_type_offset")]
    pub part_type_offset: i64,

    /// Extra language aliases, alias -> two letter code.
    #[serde(default)]
    pub language_aliases: BTreeMap<String, String>,
}

fn default_event_part_labels() -> Vec<String> {
    ["tiur_", "yh_", "seuda_", "ishiv_"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_part_type_offset() -> i64 {
    3
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            event_part_labels: default_event_part_labels(),
            part_type_offset: default_part_type_offset(),
            language_aliases: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Write every event to the log.
    #[default]
    Log,
    /// Publish events on a broadcast channel (and log them).
    Broadcast,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub sink: SinkKind,

    /// Broadcast channel buffer size.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            capacity: default_capacity(),
        }
    }
}
