use mdb_common::{OperationType, Properties, Result, ResultExt};
use mdb_db::models::File;

use super::{HandlerContext, HandlerOutput};
use crate::lineage::LineageTracker;
use crate::requests::{DemuxRequest, JoinRequest, TrimRequest};

fn join_list<T: ToString>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

pub(super) fn handle_demux(ctx: &HandlerContext<'_>, r: DemuxRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);
    let parent = lineage.find_by_sha1(&r.sha1).context("Lookup parent file")?;

    let props = Properties::new().with_opt("capture_source", r.capture_source.clone());
    let op = ctx.create_operation(OperationType::Demux, &r.operation, props)?;

    tracing::info!("Creating original and proxy of {}", parent.uid);
    let original = lineage.create(Some(&parent), &r.original.file, r.original.properties())?;
    let proxy = lineage.create(Some(&parent), &r.proxy.file, r.proxy.properties())?;

    ctx.link_files(&op, &[&parent, &original, &proxy])?;
    Ok(HandlerOutput::new(op, vec![]))
}

pub(super) fn handle_trim(ctx: &HandlerContext<'_>, r: TrimRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);
    let original = lineage.find_by_sha1(&r.original_sha1).context("Lookup original file")?;
    let proxy = lineage.find_by_sha1(&r.proxy_sha1).context("Lookup proxy file")?;

    let props = Properties::new()
        .with_opt("capture_source", r.capture_source.clone())
        .with("in", join_list(&r.in_points))
        .with("out", join_list(&r.out_points));
    let op = ctx.create_operation(OperationType::Trim, &r.operation, props)?;

    tracing::info!("Creating trimmed original and proxy");
    let original_trim = lineage.create(Some(&original), &r.original.file, r.original.properties())?;
    let proxy_trim = lineage.create(Some(&proxy), &r.proxy.file, r.proxy.properties())?;

    ctx.link_files(&op, &[&original, &original_trim, &proxy, &proxy_trim])?;
    Ok(HandlerOutput::new(op, vec![]))
}

pub(super) fn handle_join(ctx: &HandlerContext<'_>, r: JoinRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);

    let mut inputs: Vec<File> = Vec::with_capacity(r.original_shas.len() + r.proxy_shas.len());
    for (i, sha1) in r.original_shas.iter().enumerate() {
        let file = lineage
            .find_by_sha1(sha1)
            .with_context(|| format!("Original number {}, sha1 {}", i + 1, sha1))?;
        inputs.push(file);
    }
    for (i, sha1) in r.proxy_shas.iter().enumerate() {
        let file = lineage
            .find_by_sha1(sha1)
            .with_context(|| format!("Proxy number {}, sha1 {}", i + 1, sha1))?;
        inputs.push(file);
    }

    let props = Properties::new()
        .with("original_shas", r.original_shas.join(","))
        .with("proxy_shas", r.proxy_shas.join(","));
    let op = ctx.create_operation(OperationType::Join, &r.operation, props)?;

    // Joined files have several sources and no single parent.
    let original = lineage.create(None, &r.original.file, r.original.properties())?;
    let proxy = lineage.create(None, &r.proxy.file, r.proxy.properties())?;

    let mut linked: Vec<&File> = inputs.iter().collect();
    linked.push(&original);
    linked.push(&proxy);
    ctx.link_files(&op, &linked)?;
    Ok(HandlerOutput::new(op, vec![]))
}
