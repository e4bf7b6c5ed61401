//! Blob storage for raw uploaded files
//!
//! Upload bytes live outside the database so the SQLite file stays small.
//! Keys have the form `<sanitized user_id>-<user hash>/<hash-prefix>-<sanitized filename>`.
//! Sanitizing is lossy, so the user hash keeps distinct users in distinct
//! directories.
//!
//! # Architecture
//!
//! - `BlobStore` trait defines the interface for storage backends
//! - `LocalBlobStore` stores blobs under a local directory

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::Result;

mod local;

pub use local::LocalBlobStore;

/// Number of hex characters of the content hash used in blob keys
const HASH_PREFIX_LEN: usize = 12;

/// Trait for blob storage backends
pub trait BlobStore: Send + Sync {
    /// Human-readable name for this store
    fn name(&self) -> &str;

    /// Store bytes under a key, replacing any existing blob
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the bytes stored under a key
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete a blob. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Whether a blob exists under the key
    fn exists(&self, key: &str) -> bool;
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"))
}

/// Replace anything outside `[A-Za-z0-9._-]` and strip leading dots
pub fn sanitize_component(name: &str) -> String {
    let cleaned = unsafe_chars().replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Directory for a user's blobs
fn user_dir(user_id: &str) -> String {
    let digest = hex::encode(Sha256::digest(user_id.as_bytes()));
    format!("{}-{}", sanitize_component(user_id), &digest[..HASH_PREFIX_LEN])
}

/// Build the storage key for an upload
pub fn blob_key(user_id: &str, content_hash: &str, filename: &str) -> String {
    let prefix: String = content_hash.chars().take(HASH_PREFIX_LEN).collect();
    format!(
        "{}/{}-{}",
        user_dir(user_id),
        prefix,
        sanitize_component(filename)
    )
}

/// Default upload directory
pub fn default_uploads_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("auditor")
        .join("uploads")
}
