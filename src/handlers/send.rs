use mdb_common::{OperationType, Properties, Result, ResultExt};
use mdb_db::queries::content_units;

use super::{HandlerContext, HandlerOutput};
use crate::cit::CitProcessor;
use crate::lineage::LineageTracker;
use crate::requests::{SendMode, SendRequest};

pub(super) fn handle_send(ctx: &HandlerContext<'_>, r: SendRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);

    let mut original = lineage.find_by_sha1(&r.original.sha1).context("Lookup original file")?;
    if lineage.rename(&mut original, &r.original.file_name).context("Rename original file")? {
        tracing::info!("Renamed original to {}", original.name);
    }
    let mut proxy = lineage.find_by_sha1(&r.proxy.sha1).context("Lookup proxy file")?;
    if lineage.rename(&mut proxy, &r.proxy.file_name).context("Rename proxy file")? {
        tracing::info!("Renamed proxy to {}", proxy.name);
    }

    tracing::info!("Processing CIT metadata: {:?} mode", r.mode);
    let processor = CitProcessor::new(ctx.conn, ctx.registry);
    let outcome = match r.mode {
        SendMode::New => processor.process_new(&r.metadata, &mut original, &mut proxy),
        SendMode::Update => processor.process_update(&r.metadata, &mut original, &mut proxy),
    }
    .context("Process CIT metadata")?;

    let op = ctx.create_operation(OperationType::Send, &r.operation, r.metadata.scalar_properties())?;
    ctx.link_files(&op, &[&original, &proxy])?;

    if let Some(workflow_id) = r.operation.workflow_id.as_deref() {
        tracing::debug!("Updating unit workflow_id to {}", workflow_id);
        content_units::merge_properties(
            ctx.conn,
            outcome.unit.id,
            &Properties::new().with("workflow_id", workflow_id),
        )
        .with_context(|| format!("Stamp workflow_id on unit {}", outcome.unit.uid))?;
    }

    Ok(HandlerOutput::new(op, outcome.events))
}
