//! Shared test harness for integration tests.
//!
//! [`TestHarness`] wires a [`Dispatcher`] to an in-memory database and a
//! [`RecordingSink`]. The in-memory pool holds a single connection, so a
//! connection taken with [`TestHarness::conn`] must be dropped before the next
//! call to [`TestHarness::process`].

#![allow(dead_code)]

use std::sync::Arc;

use mdb::dispatch::Dispatcher;
use mdb::events::{DomainEvent, RecordingSink};
use mdb::handlers::HandlerOutput;
use mdb::registry::Registry;
use mdb_common::{OperationType, Result};
use mdb_db::models::{ContentUnit, File};
use mdb_db::pool::{get_conn, init_memory_pool, PooledConnection};
use mdb_db::queries::{content_units, files};
use serde_json::{json, Value};

pub struct TestHarness {
    pub dispatcher: Dispatcher,
    pub sink: Arc<RecordingSink>,
}

impl TestHarness {
    pub fn new() -> Self {
        let pool = init_memory_pool().expect("failed to create in-memory pool");
        let registry = {
            let conn = get_conn(&pool).expect("failed to get connection");
            Registry::load(&conn, &Default::default()).expect("failed to load registry")
        };
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new(pool, Arc::new(registry), sink.clone());
        Self { dispatcher, sink }
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(self.dispatcher.pool()).expect("failed to get connection")
    }

    pub fn process(&self, op_type: OperationType, payload: Value) -> Result<HandlerOutput> {
        self.dispatcher.process(op_type, payload)
    }

    /// Process an event that must succeed, returning its events.
    pub fn ok(&self, op_type: OperationType, payload: Value) -> Vec<DomainEvent> {
        match self.process(op_type, payload) {
            Ok(out) => out.events,
            Err(e) => panic!("{} failed: {}", op_type, e),
        }
    }

    pub fn file(&self, n: u32) -> File {
        files::find_by_sha1(&self.conn(), &sha(n))
            .unwrap()
            .unwrap_or_else(|| panic!("file {} missing", n))
    }

    pub fn unit_of(&self, n: u32) -> ContentUnit {
        let id = self.file(n).content_unit_id.expect("file has no content unit");
        content_units::get_content_unit(&self.conn(), id).unwrap()
    }

    /// capture_start + capture_stop of workflow `wf`, producing file `n`.
    pub fn capture(&self, wf: &str, capture_id: &str, n: u32) {
        self.ok(
            OperationType::CaptureStart,
            json!({"workflow_id": wf, "file_name": format!("{}.mp4", wf), "collection_uid": capture_id}),
        );
        self.ok(
            OperationType::CaptureStop,
            json!({
                "workflow_id": wf,
                "file_name": format!("{}.mp4", wf),
                "sha1": sha(n),
                "size": 1000,
                "collection_uid": capture_id
            }),
        );
    }

    /// Demux file `parent` into original `original` and proxy `original + 1`.
    pub fn demux(&self, parent: u32, original: u32) {
        self.ok(
            OperationType::Demux,
            json!({
                "sha1": sha(parent),
                "original": {"file_name": format!("o{}.mp4", original), "sha1": sha(original), "duration": 600.0},
                "proxy": {"file_name": format!("p{}.mp4", original + 1), "sha1": sha(original + 1), "duration": 600.0}
            }),
        );
    }

    pub fn send(&self, original: u32, metadata: Value) -> Result<HandlerOutput> {
        self.process(
            OperationType::Send,
            json!({
                "workflow_id": format!("send-{}", original),
                "original": {"sha1": sha(original), "file_name": format!("o{}.mp4", original)},
                "proxy": {"sha1": sha(original + 1), "file_name": format!("p{}.mp4", original + 1)},
                "metadata": metadata
            }),
        )
    }
}

pub fn sha(n: u32) -> String {
    format!("{:040x}", n)
}
