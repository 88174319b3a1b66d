//! Transcode queue bookkeeping.
//!
//! Rows are enqueued when a file is scheduled for transcoding and stamped
//! with the transcode operation once the transcoder reports back.

use chrono::Utc;
use mdb_common::{FileId, OperationId, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::{db_err, id_col, opt_id_col, time_col};
use crate::models::BatchConvert;

/// Queue a file for transcoding. Re-queueing resets the request.
pub fn enqueue(conn: &Connection, file: FileId) -> Result<()> {
    conn.execute(
        "INSERT INTO batch_convert (file_id, operation_id, request_at) VALUES (?1, NULL, ?2)
         ON CONFLICT (file_id) DO UPDATE SET operation_id = NULL, request_at = excluded.request_at",
        params![file.to_string(), Utc::now().to_rfc3339()],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Record the operation that answered a queued file. Returns whether a
/// queue row existed.
pub fn assign_operation(conn: &Connection, file: FileId, operation: OperationId) -> Result<bool> {
    let rows = conn
        .execute(
            "UPDATE batch_convert SET operation_id = ?2 WHERE file_id = ?1",
            params![file.to_string(), operation.to_string()],
        )
        .map_err(db_err)?;
    Ok(rows > 0)
}

pub fn get(conn: &Connection, file: FileId) -> Result<Option<BatchConvert>> {
    conn.query_row(
        "SELECT file_id, operation_id, request_at FROM batch_convert WHERE file_id = ?",
        [file.to_string()],
        |row| {
            Ok(BatchConvert {
                file_id: id_col(row, 0)?,
                operation_id: opt_id_col(row, 1)?,
                request_at: time_col(row, 2)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewFile, NewOperation};
    use crate::queries::files::create_file;
    use crate::queries::operations::create_operation;
    use crate::queries::test_support::{setup_test_db, sha};
    use mdb_common::{OperationType, Properties};

    #[test]
    fn test_enqueue_and_assign() {
        let conn = setup_test_db();
        let file = create_file(
            &conn,
            &NewFile {
                name: "lesson.mp4".to_string(),
                sha1: Some(sha(1)),
                ..Default::default()
            },
        )
        .unwrap();
        let op = create_operation(
            &conn,
            &NewOperation {
                op_type: OperationType::Transcode,
                station: None,
                user_email: None,
                details: None,
                properties: Properties::new(),
            },
        )
        .unwrap();

        assert!(!assign_operation(&conn, file.id, op.id).unwrap());

        enqueue(&conn, file.id).unwrap();
        assert_eq!(get(&conn, file.id).unwrap().unwrap().operation_id, None);

        assert!(assign_operation(&conn, file.id, op.id).unwrap());
        assert_eq!(get(&conn, file.id).unwrap().unwrap().operation_id, Some(op.id));

        enqueue(&conn, file.id).unwrap();
        assert_eq!(get(&conn, file.id).unwrap().unwrap().operation_id, None);
    }
}
