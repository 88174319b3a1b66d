//! Operation handlers, one per inbound pipeline event.
//!
//! Handlers run inside the dispatcher's transaction. They mutate the archive
//! through the store and the lineage/unit/collection components, and return
//! the operation they journaled together with the events describing what
//! changed. Returning an error rolls back everything the handler did.

mod capture;
mod convert;
mod demux;
mod impact;
mod insert;
mod send;
mod upload;

use mdb_common::{OperationType, Properties, Result, ResultExt};
use mdb_db::models::{File, Operation};
use mdb_db::queries::operations;
use rusqlite::Connection;

use crate::events::DomainEvent;
use crate::registry::Registry;
use crate::requests::{OperationAttrs, Request};

pub use impact::{publish_file, remove_file};

/// What a handler did.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    /// The journaled operation. `None` for a no-op.
    pub operation: Option<Operation>,
    pub events: Vec<DomainEvent>,
}

impl HandlerOutput {
    pub fn new(operation: Operation, events: Vec<DomainEvent>) -> Self {
        Self {
            operation: Some(operation),
            events,
        }
    }

    pub fn noop() -> Self {
        Self::default()
    }
}

/// Everything a handler needs: the transaction's connection and the registry.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub conn: &'a Connection,
    pub registry: &'a Registry,
}

impl<'a> HandlerContext<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    /// Journal an operation of `op_type`.
    pub(crate) fn create_operation(
        &self,
        op_type: OperationType,
        attrs: &OperationAttrs,
        props: Properties,
    ) -> Result<Operation> {
        let op = operations::create_operation(self.conn, &attrs.new_operation(op_type, props))
            .context("Create operation")?;
        tracing::info!(uid = %op.uid, "Created {} operation", op_type);
        Ok(op)
    }

    /// Associate files with an operation.
    pub(crate) fn link_files(&self, op: &Operation, files: &[&File]) -> Result<()> {
        let ids: Vec<_> = files.iter().map(|f| f.id).collect();
        operations::link_files(self.conn, op.id, &ids).context("Associate files to operation")
    }
}

/// Route a parsed request to its handler.
pub fn handle(ctx: &HandlerContext<'_>, request: Request) -> Result<HandlerOutput> {
    match request {
        Request::CaptureStart(r) => capture::handle_capture_start(ctx, r),
        Request::CaptureStop(r) => capture::handle_capture_stop(ctx, r),
        Request::Demux(r) => demux::handle_demux(ctx, r),
        Request::Trim(r) => demux::handle_trim(ctx, r),
        Request::Join(r) => demux::handle_join(ctx, r),
        Request::Send(r) => send::handle_send(ctx, r),
        Request::Convert(r) => convert::handle_convert(ctx, r),
        Request::Transcode(r) => convert::handle_transcode(ctx, r),
        Request::Upload(r) => upload::handle_upload(ctx, r),
        Request::Sirtutim(r) => upload::handle_sirtutim(ctx, r),
        Request::Insert(r) => insert::handle_insert(ctx, r),
    }
}
