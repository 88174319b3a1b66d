use mdb_common::{OperationType, Properties, Result, ResultExt};
use mdb_db::queries::files;

use super::impact::publish_file;
use super::{HandlerContext, HandlerOutput};
use crate::lineage::LineageTracker;
use crate::requests::{SirtutimRequest, UploadRequest};

pub(super) fn handle_upload(ctx: &HandlerContext<'_>, r: UploadRequest) -> Result<HandlerOutput> {
    let op = ctx.create_operation(OperationType::Upload, &r.operation, Properties::new())?;

    let lineage = LineageTracker::new(ctx.conn, ctx.registry);
    let mut file = match lineage.find_optional(&r.file.sha1)? {
        Some(file) => file,
        None => {
            tracing::info!("Uploaded file {} not found, creating new", r.file.sha1);
            lineage.create(None, &r.file, Properties::new())?
        }
    };

    let props = Properties::new()
        .with("url", r.url.as_str())
        .with_opt("duration", r.duration);
    file.properties = files::merge_properties(ctx.conn, file.id, &props).context("Update file properties")?;

    let events = publish_file(ctx.conn, &mut file)?;
    ctx.link_files(&op, &[&file])?;
    Ok(HandlerOutput::new(op, events))
}

pub(super) fn handle_sirtutim(ctx: &HandlerContext<'_>, r: SirtutimRequest) -> Result<HandlerOutput> {
    let op = ctx.create_operation(OperationType::Sirtutim, &r.operation, Properties::new())?;

    let lineage = LineageTracker::new(ctx.conn, ctx.registry);
    let mut attrs = r.file.clone();
    attrs.file_type = Some("image".to_string());
    let mut file = lineage.create(None, &attrs, Properties::new())?;

    let original = match r.original_sha1.as_deref().filter(|s| !s.is_empty()) {
        Some(sha1) => {
            let found = lineage.find_optional(sha1)?;
            if found.is_none() {
                tracing::warn!("Original file not found [{}]", sha1);
            }
            found
        }
        None => None,
    };

    if let Some(original) = &original {
        match original.content_unit_id {
            Some(unit) => {
                tracing::info!("Associating {} to content unit {}", file.uid, unit);
                files::set_content_unit(ctx.conn, &[file.id], unit)?;
                file.content_unit_id = Some(unit);
            }
            None => tracing::warn!("Original file {} is not associated to any content unit", original.uid),
        }
    }

    match &original {
        Some(original) => ctx.link_files(&op, &[original, &file])?,
        None => ctx.link_files(&op, &[&file])?,
    }
    Ok(HandlerOutput::new(op, vec![]))
}
