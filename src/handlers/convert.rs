use mdb_common::{OperationType, Properties, Result, ResultExt};
use mdb_db::models::File;
use mdb_db::queries::{batch_convert, files};

use super::{HandlerContext, HandlerOutput};
use crate::events::DomainEvent;
use crate::lineage::{dedup_by_sha1, LineageTracker};
use crate::requests::{ConvertRequest, TranscodeRequest};

pub(super) fn handle_convert(ctx: &HandlerContext<'_>, r: ConvertRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);
    let Some(input) = lineage.find_optional(&r.sha1).context("Lookup parent")? else {
        tracing::info!("Convert input {} not found, nothing to do", r.sha1);
        return Ok(HandlerOutput::noop());
    };

    let op = ctx.create_operation(OperationType::Convert, &r.operation, Properties::new())?;

    // Outputs without a translated audio track are byte identical.
    let outputs = dedup_by_sha1(&r.output, |o| o.file.sha1.as_str());
    tracing::info!("{} unique files out of {}", outputs.len(), r.output.len());

    let mut events = Vec::new();
    let mut produced: Vec<File> = Vec::with_capacity(outputs.len());
    for output in outputs {
        let props = output.properties();
        let file = match lineage.find_optional(&output.file.sha1)? {
            Some(existing) => {
                tracing::info!("File already exists, updating: {}", output.file.sha1);
                let mut file = lineage
                    .update(&existing, Some(&input), &output.file, &props)
                    .context("Update file")?;
                lineage.resurrect(&mut file).context("Restore file")?;
                events.push(DomainEvent::file_updated(&file));
                file
            }
            None => lineage.create(Some(&input), &output.file, props).context("Create file")?,
        };
        produced.push(file);
    }

    let mut linked: Vec<&File> = vec![&input];
    linked.extend(produced.iter());
    ctx.link_files(&op, &linked)?;
    Ok(HandlerOutput::new(op, events))
}

pub(super) fn handle_transcode(ctx: &HandlerContext<'_>, r: TranscodeRequest) -> Result<HandlerOutput> {
    let lineage = LineageTracker::new(ctx.conn, ctx.registry);

    if let Some(message) = r.error_message() {
        tracing::info!("Transcode error: {}", message);
        let props = Properties::new().with("message", message);
        let op = ctx.create_operation(OperationType::Transcode, &r.operation, props)?;
        let original = lineage
            .find_by_sha1(&r.original_sha1)
            .with_context(|| format!("Lookup original file {}", r.original_sha1))?;
        batch_convert::assign_operation(ctx.conn, original.id, op.id).context("Update queue table")?;
        ctx.link_files(&op, &[&original])?;
        return Ok(HandlerOutput::new(op, vec![]));
    }

    let op = ctx.create_operation(OperationType::Transcode, &r.operation, Properties::new())?;
    let original = lineage
        .find_by_sha1(&r.original_sha1)
        .with_context(|| format!("Lookup original file {}", r.original_sha1))?;

    let mut attrs = r.as_file()?;
    if let Some(mp4) = ctx.registry.media_type_by_extension("mp4") {
        attrs.file_type = Some(mp4.file_type.to_string());
        attrs.mime_type = Some(mp4.mime_type.to_string());
    }
    attrs.language = original.language.clone();

    let props = Properties::new().with_opt("duration", original.properties.get("duration").cloned());
    let mut file = lineage.create(Some(&original), &attrs, props)?;

    file.published = true;
    file.secure = original.secure;
    files::update_file(ctx.conn, &file)
        .with_context(|| format!("Update secure published {}", file.uid))?;

    batch_convert::assign_operation(ctx.conn, original.id, op.id).context("Update queue table")?;

    let mut removed = Vec::new();
    for mut child in lineage.children(original.id).context("Load original children")? {
        if child.id == file.id {
            continue;
        }
        tracing::info!("Removing superseded child file {}", child.uid);
        lineage.soft_remove(&mut child)?;
        removed.push(child);
    }

    let mut linked: Vec<&File> = vec![&original, &file];
    linked.extend(removed.iter());
    ctx.link_files(&op, &linked)?;
    Ok(HandlerOutput::new(op, vec![]))
}
