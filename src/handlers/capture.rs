use mdb_common::{OperationType, Properties, Result, ResultExt};
use mdb_db::queries::{files, operations};

use super::{HandlerContext, HandlerOutput};
use crate::lineage::LineageTracker;
use crate::requests::{CaptureStartRequest, CaptureStopRequest};

pub(super) fn handle_capture_start(ctx: &HandlerContext<'_>, r: CaptureStartRequest) -> Result<HandlerOutput> {
    let props = Properties::new()
        .with_opt("capture_source", r.capture_source.clone())
        .with_opt("collection_uid", r.collection_uid.clone());
    let op = ctx.create_operation(OperationType::CaptureStart, &r.operation, props)?;

    // The recording has no content yet, hence no hash.
    let file = LineageTracker::new(ctx.conn, ctx.registry).create_unhashed(&r.file_name, Properties::new())?;
    ctx.link_files(&op, &[&file])?;
    Ok(HandlerOutput::new(op, vec![]))
}

pub(super) fn handle_capture_stop(ctx: &HandlerContext<'_>, r: CaptureStopRequest) -> Result<HandlerOutput> {
    let props = Properties::new()
        .with_opt("capture_source", r.capture_source.clone())
        .with_opt("collection_uid", r.collection_uid.clone())
        .with_opt("part", r.part.clone());
    let op = ctx.create_operation(OperationType::CaptureStop, &r.operation, props)?;

    let parent = match r.operation.workflow_id.as_deref() {
        Some(workflow_id) => {
            tracing::info!("Looking up parent file, workflow_id={}", workflow_id);
            let found = operations::find_file_by_workflow(ctx.conn, OperationType::CaptureStart, workflow_id)
                .context("Lookup capture_start file")?;
            if found.is_none() {
                tracing::warn!("capture_start operation not found for workflow_id [{}], skipping", workflow_id);
            }
            found.map(|id| files::get_file(ctx.conn, id)).transpose()?
        }
        None => {
            tracing::warn!("capture_stop without workflow_id, no parent file");
            None
        }
    };

    let file_props = r.file.properties().with_opt("label_id", r.label_id);
    let file = LineageTracker::new(ctx.conn, ctx.registry).create(parent.as_ref(), &r.file.file, file_props)?;
    ctx.link_files(&op, &[&file])?;
    Ok(HandlerOutput::new(op, vec![]))
}
