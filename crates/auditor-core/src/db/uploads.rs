//! Upload record operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{AggregateMetrics, FileType, NewUpload, Upload, UploadAnalysis};

const UPLOAD_COLUMNS: &str = "id, user_id, filename, storage_path, file_type, content_hash, \
     size_bytes, row_count, processed, error, analysis, created_at, processed_at";

fn row_to_upload(row: &Row) -> rusqlite::Result<Upload> {
    let file_type_str: String = row.get(4)?;
    let analysis_str: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(11)?;
    let processed_at_str: Option<String> = row.get(12)?;

    Ok(Upload {
        id: row.get(0)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        storage_path: row.get(3)?,
        file_type: file_type_str.parse().unwrap_or(FileType::Csv),
        content_hash: row.get(5)?,
        size_bytes: row.get(6)?,
        row_count: row.get(7)?,
        processed: row.get(8)?,
        error: row.get(9)?,
        analysis: analysis_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&created_at_str),
        processed_at: processed_at_str.map(|s| parse_datetime(&s)),
    })
}

impl Database {
    /// Insert a new, unprocessed upload
    pub fn create_upload(&self, upload: &NewUpload) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO uploads (user_id, filename, storage_path, file_type, content_hash, size_bytes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                upload.user_id,
                upload.filename,
                upload.storage_path,
                upload.file_type.as_str(),
                upload.content_hash,
                upload.size_bytes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_upload(&self, id: i64) -> Result<Option<Upload>> {
        let conn = self.conn()?;
        let upload = conn
            .query_row(
                &format!("SELECT {} FROM uploads WHERE id = ?", UPLOAD_COLUMNS),
                params![id],
                row_to_upload,
            )
            .optional()?;
        Ok(upload)
    }

    /// List uploads, newest first, optionally for one user
    pub fn list_uploads(&self, user_id: Option<&str>) -> Result<Vec<Upload>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM uploads WHERE (?1 IS NULL OR user_id = ?1) ORDER BY created_at DESC, id DESC",
            UPLOAD_COLUMNS
        ))?;

        let uploads = stmt
            .query_map(params![user_id], row_to_upload)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(uploads)
    }

    /// Find an earlier upload of the same bytes by the same user
    pub fn find_upload_by_hash(&self, user_id: &str, content_hash: &str) -> Result<Option<Upload>> {
        let conn = self.conn()?;
        let upload = conn
            .query_row(
                &format!(
                    "SELECT {} FROM uploads WHERE user_id = ? AND content_hash = ? ORDER BY id DESC LIMIT 1",
                    UPLOAD_COLUMNS
                ),
                params![user_id, content_hash],
                row_to_upload,
            )
            .optional()?;
        Ok(upload)
    }

    /// Record a successful analysis
    pub fn mark_upload_processed(&self, id: i64, analysis: &UploadAnalysis) -> Result<()> {
        let conn = self.conn()?;
        let analysis_json = serde_json::to_string(analysis)?;
        conn.execute(
            r#"
            UPDATE uploads
            SET processed = 1, error = NULL, analysis = ?, row_count = ?,
                processed_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![analysis_json, analysis.row_count, id],
        )?;
        Ok(())
    }

    /// Record a processing failure
    pub fn mark_upload_failed(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE uploads
            SET processed = 0, error = ?, analysis = NULL, processed_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![error, id],
        )?;
        Ok(())
    }

    /// Point an existing upload at a new filename and file type
    pub fn update_upload_source(&self, id: i64, filename: &str, file_type: FileType) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE uploads SET filename = ?, file_type = ? WHERE id = ?",
            params![filename, file_type.as_str(), id],
        )?;
        Ok(())
    }

    /// Delete an upload record. Returns false when it didn't exist.
    pub fn delete_upload(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM uploads WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// Delete all of a user's uploads, returning the removed records
    ///
    /// The caller is responsible for deleting the stored blobs.
    pub fn delete_uploads_for_user(&self, user_id: &str) -> Result<Vec<Upload>> {
        let removed = self.list_uploads(Some(user_id))?;
        let conn = self.conn()?;
        conn.execute("DELETE FROM uploads WHERE user_id = ?", params![user_id])?;
        Ok(removed)
    }

    /// Combined metrics across a user's processed uploads
    pub fn spreadsheet_metrics(&self, user_id: &str) -> Result<(AggregateMetrics, i64)> {
        let mut total = AggregateMetrics::default();
        let mut count = 0;
        for upload in self.list_uploads(Some(user_id))? {
            if let (true, Some(analysis)) = (upload.processed, upload.analysis.as_ref()) {
                total = total.merge(&analysis.metrics);
                count += 1;
            }
        }
        Ok((total, count))
    }

    /// Users with at least one processed upload
    pub fn users_with_processed_uploads(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT user_id FROM uploads WHERE processed = 1 ORDER BY user_id",
        )?;
        let users = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(users)
    }
}
