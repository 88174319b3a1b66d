//! Transactional entry point for pipeline events.
//!
//! Each event runs inside one database transaction. Events produced by the
//! handler reach the sink only after the commit; a failed operation leaves
//! no trace in the store and emits nothing.

use std::sync::Arc;

use mdb_common::{Error, OperationType, Result, ResultExt};
use mdb_db::pool::{get_conn, init_pool, DbPool};
use mdb_db::tx::in_transaction;

use crate::config::Config;
use crate::events::{build_sink, EventSink};
use crate::handlers::{self, HandlerContext, HandlerOutput};
use crate::registry::Registry;
use crate::requests::Request;

pub struct Dispatcher {
    pool: DbPool,
    registry: Arc<Registry>,
    sink: Arc<dyn EventSink>,
}

impl Dispatcher {
    pub fn new(pool: DbPool, registry: Arc<Registry>, sink: Arc<dyn EventSink>) -> Self {
        Self { pool, registry, sink }
    }

    /// Open the configured database, load the registry and build the sink.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.database.path.to_string_lossy();
        tracing::info!("Opening archive database at {}", path);
        let pool = init_pool(&path, config.database.pool_size)?;
        let registry = {
            let conn = get_conn(&pool)?;
            Registry::load(&conn, &config.registry).context("Load registry")?
        };
        Ok(Self::new(pool, Arc::new(registry), build_sink(&config.events)))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Apply one pipeline event.
    pub fn process(&self, op_type: OperationType, payload: serde_json::Value) -> Result<HandlerOutput> {
        let _span = tracing::info_span!("operation", op = %op_type).entered();

        let request = Request::parse(op_type, payload)?;
        let mut conn = get_conn(&self.pool)?;
        let output = in_transaction(&mut conn, |tx| {
            let ctx = HandlerContext::new(tx, &self.registry);
            handlers::handle(&ctx, request)
        })
        .with_context(|| format!("Handle operation {}", op_type))?;
        drop(conn);

        match &output.operation {
            Some(op) => tracing::info!(uid = %op.uid, events = output.events.len(), "Operation committed"),
            None => tracing::info!("Nothing to do"),
        }
        self.sink.emit(&output.events);
        Ok(output)
    }

    /// Apply one pipeline event given its type name.
    pub fn process_raw(&self, op_type: &str, payload: serde_json::Value) -> Result<HandlerOutput> {
        let op_type: OperationType = op_type.parse().map_err(Error::validation)?;
        self.process(op_type, payload)
    }
}
