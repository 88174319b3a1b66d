//! Domain events and the sinks that receive them.
//!
//! Handlers return [`DomainEvent`]s describing what changed. The dispatcher
//! hands them to an [`EventSink`] only after the transaction committed, so a
//! sink never sees events for rolled back work.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mdb_db::models::{Collection, ContentUnit, File};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{EventsConfig, SinkKind};

/// Maximum number of events retained by [`BroadcastSink`] for late readers.
const MAX_RECENT_EVENTS: usize = 100;

/// What changed in the archive. Entities are identified by UID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    FileInserted {
        file_uid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert_type: Option<String>,
    },
    FileUpdated {
        file_uid: String,
    },
    FileReplaced {
        old_uid: String,
        new_uid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert_type: Option<String>,
    },
    FilePublished {
        file_uid: String,
    },
    FileRemoved {
        file_uid: String,
    },
    ContentUnitCreated {
        unit_uid: String,
    },
    ContentUnitUpdated {
        unit_uid: String,
    },
    ContentUnitPublished {
        unit_uid: String,
    },
    CollectionCreated {
        collection_uid: String,
    },
    CollectionUpdated {
        collection_uid: String,
    },
    CollectionPublished {
        collection_uid: String,
    },
}

impl DomainEvent {
    pub fn file_inserted(file: &File, insert_type: Option<&str>) -> Self {
        Self::FileInserted {
            file_uid: file.uid.clone(),
            insert_type: insert_type.map(str::to_string),
        }
    }

    pub fn file_updated(file: &File) -> Self {
        Self::FileUpdated {
            file_uid: file.uid.clone(),
        }
    }

    pub fn file_replaced(old: &File, new: &File, insert_type: Option<&str>) -> Self {
        Self::FileReplaced {
            old_uid: old.uid.clone(),
            new_uid: new.uid.clone(),
            insert_type: insert_type.map(str::to_string),
        }
    }

    pub fn file_published(file: &File) -> Self {
        Self::FilePublished {
            file_uid: file.uid.clone(),
        }
    }

    pub fn file_removed(file: &File) -> Self {
        Self::FileRemoved {
            file_uid: file.uid.clone(),
        }
    }

    pub fn unit_created(unit: &ContentUnit) -> Self {
        Self::ContentUnitCreated {
            unit_uid: unit.uid.clone(),
        }
    }

    pub fn unit_updated(unit: &ContentUnit) -> Self {
        Self::ContentUnitUpdated {
            unit_uid: unit.uid.clone(),
        }
    }

    pub fn unit_published(unit: &ContentUnit) -> Self {
        Self::ContentUnitPublished {
            unit_uid: unit.uid.clone(),
        }
    }

    pub fn collection_created(collection: &Collection) -> Self {
        Self::CollectionCreated {
            collection_uid: collection.uid.clone(),
        }
    }

    pub fn collection_updated(collection: &Collection) -> Self {
        Self::CollectionUpdated {
            collection_uid: collection.uid.clone(),
        }
    }

    pub fn collection_published(collection: &Collection) -> Self {
        Self::CollectionPublished {
            collection_uid: collection.uid.clone(),
        }
    }

    /// Event name as serialized in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileInserted { .. } => "file_inserted",
            Self::FileUpdated { .. } => "file_updated",
            Self::FileReplaced { .. } => "file_replaced",
            Self::FilePublished { .. } => "file_published",
            Self::FileRemoved { .. } => "file_removed",
            Self::ContentUnitCreated { .. } => "content_unit_created",
            Self::ContentUnitUpdated { .. } => "content_unit_updated",
            Self::ContentUnitPublished { .. } => "content_unit_published",
            Self::CollectionCreated { .. } => "collection_created",
            Self::CollectionUpdated { .. } => "collection_updated",
            Self::CollectionPublished { .. } => "collection_published",
        }
    }
}

/// A timestamped event as published on the broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventRecord {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Receives the events of committed operations.
pub trait EventSink: Send + Sync {
    fn emit(&self, events: &[DomainEvent]);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, events: &[DomainEvent]) {
        for event in events {
            match serde_json::to_string(event) {
                Ok(json) => tracing::info!(event = event.kind(), "{}", json),
                Err(e) => tracing::warn!("Failed to serialize event {:?}: {}", event, e),
            }
        }
    }
}

/// Publishes events on a tokio broadcast channel and keeps a bounded ring
/// buffer of recent ones.
pub struct BroadcastSink {
    tx: broadcast::Sender<EventRecord>,
    recent: RwLock<VecDeque<EventRecord>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<EventRecord> {
        self.recent.read().iter().take(n).cloned().collect()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, events: &[DomainEvent]) {
        for event in events {
            let record = EventRecord::new(event.clone());
            {
                let mut recent = self.recent.write();
                if recent.len() >= MAX_RECENT_EVENTS {
                    recent.pop_back();
                }
                recent.push_front(record.clone());
            }
            tracing::debug!(event = event.kind(), "Broadcasting event");
            // No subscribers is fine.
            let _ = self.tx.send(record);
        }
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Keeps every emitted event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, events: &[DomainEvent]) {
        self.events.lock().extend_from_slice(events);
    }
}

/// Build the sink selected in configuration.
pub fn build_sink(cfg: &EventsConfig) -> Arc<dyn EventSink> {
    match cfg.sink {
        SinkKind::Log => Arc::new(LogSink),
        SinkKind::Broadcast => Arc::new(BroadcastSink::new(cfg.capacity)),
    }
}
