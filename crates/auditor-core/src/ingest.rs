//! Upload intake
//!
//! Stores the raw file in blob storage, records the upload, then reads,
//! classifies and aggregates it. A spreadsheet that can't be read marks the
//! upload failed (the error text is kept on the record) and the call returns
//! `Error::Upload`.

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::aggregate::analyze_sheet;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{FileType, NewUpload, Upload, UploadAnalysis};
use crate::sheet::read_sheet;
use crate::storage::{blob_key, BlobStore};

/// A file submitted for intake
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub user_id: &'a str,
    pub filename: &'a str,
    pub bytes: &'a [u8],
    /// Declared type (`csv`, `xlsx`, or a mime type). Falls back to the extension.
    pub declared_type: Option<&'a str>,
    /// Delete the user's earlier uploads and audits first
    pub replace: bool,
}

/// What a `replace` submission (or an explicit clear) removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearedData {
    pub uploads: usize,
    pub audits: usize,
}

/// SHA-256 of the file contents, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Pick the file type from the declared type, else the filename extension
pub fn resolve_file_type(declared: Option<&str>, filename: &str) -> Result<FileType> {
    if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
        match declared.parse::<FileType>() {
            Ok(file_type) => return Ok(file_type),
            Err(_) => debug!(declared, "Unrecognized declared file type, using extension"),
        }
    }

    FileType::from_filename(filename)
        .ok_or_else(|| Error::UnsupportedFileType(format!("{} (expected .csv or .xlsx)", filename)))
}

/// Upload intake over a database and a blob store
pub struct UploadIntake<'a> {
    db: &'a Database,
    store: &'a dyn BlobStore,
    max_size: usize,
}

impl<'a> UploadIntake<'a> {
    pub fn new(db: &'a Database, store: &'a dyn BlobStore) -> Self {
        Self {
            db,
            store,
            max_size: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Override the size limit
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Store, record and process a file
    ///
    /// Re-submitting bytes the user already uploaded returns the earlier
    /// record (reprocessing it if it had failed).
    pub fn submit(&self, request: &UploadRequest<'_>) -> Result<Upload> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidData("user_id is required".into()));
        }
        if request.bytes.is_empty() {
            return Err(Error::Upload(format!("{} is empty", request.filename)));
        }
        if request.bytes.len() > self.max_size {
            return Err(Error::Upload(format!(
                "{} is {} bytes, limit is {} bytes",
                request.filename,
                request.bytes.len(),
                self.max_size
            )));
        }

        let file_type = resolve_file_type(request.declared_type, request.filename)?;

        if request.replace {
            let cleared = self.clear_user(user_id)?;
            info!(
                user_id,
                uploads = cleared.uploads,
                audits = cleared.audits,
                "Cleared previous data"
            );
        }

        let hash = content_hash(request.bytes);
        if let Some(existing) = self.db.find_upload_by_hash(user_id, &hash)? {
            if existing.processed {
                info!(upload_id = existing.id, "Duplicate upload, returning existing record");
                return Ok(existing);
            }
            debug!(
                upload_id = existing.id,
                file_type = %file_type,
                "Duplicate of a failed upload, reprocessing"
            );
            if existing.file_type != file_type || existing.filename != request.filename {
                self.db
                    .update_upload_source(existing.id, request.filename, file_type)?;
            }
            return self.process(existing.id);
        }

        let storage_path = blob_key(user_id, &hash, request.filename);
        self.store.put(&storage_path, request.bytes)?;

        let id = self.db.create_upload(&NewUpload {
            user_id: user_id.to_string(),
            filename: request.filename.to_string(),
            storage_path,
            file_type,
            content_hash: hash,
            size_bytes: request.bytes.len() as i64,
        })?;

        info!(
            upload_id = id,
            user_id,
            filename = request.filename,
            file_type = %file_type,
            store = self.store.name(),
            "Stored upload"
        );

        self.process(id)
    }

    /// (Re)process a stored upload
    pub fn process(&self, upload_id: i64) -> Result<Upload> {
        let upload = self
            .db
            .get_upload(upload_id)?
            .ok_or_else(|| Error::NotFound(format!("Upload {}", upload_id)))?;

        match self.analyze(&upload) {
            Ok(analysis) => {
                debug!(
                    upload_id,
                    rows = analysis.row_count,
                    revenue = analysis.metrics.total_revenue,
                    cost = analysis.metrics.total_cost,
                    "Processed upload"
                );
                for warning in &analysis.warnings {
                    debug!(upload_id, %warning, "Aggregation warning");
                }
                self.db.mark_upload_processed(upload_id, &analysis)?;
            }
            Err(e) => {
                let message = e.to_string();
                warn!(upload_id, error = %message, "Upload processing failed");
                self.db.mark_upload_failed(upload_id, &message)?;
                return Err(Error::Upload(format!("{}: {}", upload.filename, message)));
            }
        }

        self.db
            .get_upload(upload_id)?
            .ok_or_else(|| Error::NotFound(format!("Upload {}", upload_id)))
    }

    fn analyze(&self, upload: &Upload) -> Result<UploadAnalysis> {
        let bytes = self.store.get(&upload.storage_path)?;
        let sheet = read_sheet(&bytes, upload.file_type)?;
        Ok(analyze_sheet(&sheet))
    }

    /// Delete an upload and its blob. Returns false when it didn't exist.
    pub fn delete(&self, upload_id: i64) -> Result<bool> {
        let Some(upload) = self.db.get_upload(upload_id)? else {
            return Ok(false);
        };

        self.db.delete_upload(upload_id)?;
        self.store.delete(&upload.storage_path)?;
        Ok(true)
    }

    /// Delete every upload (with blobs) and audit belonging to a user
    pub fn clear_user(&self, user_id: &str) -> Result<ClearedData> {
        let removed = self.db.delete_uploads_for_user(user_id)?;
        for upload in &removed {
            if let Err(e) = self.store.delete(&upload.storage_path) {
                warn!(upload_id = upload.id, error = %e, "Failed to delete blob");
            }
        }
        let audits = self.db.delete_audits_for_user(user_id)?;

        Ok(ClearedData {
            uploads: removed.len(),
            audits,
        })
    }
}
