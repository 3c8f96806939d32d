use crate::config::Config;
use crate::db::{BlobRow, Database};
use crate::error::{StoreError, StoreResult};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const UNKNOWN_NAME: &str = "Unknown";

/// Content-addressed blob storage on the local filesystem.
///
/// Blobs are named by the SHA-256 of their bytes and sharded by the first two
/// hex digits. Metadata and one-time upload tickets live in the database.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    base_url: Url,
    ticket_ttl_ms: i64,
    max_bytes: u64,
}

impl BlobStore {
    pub fn new(
        root: PathBuf,
        base_url: &str,
        ticket_ttl_seconds: u64,
        max_bytes: u64,
    ) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).with_context(|| format!("Invalid base URL: {base_url}"))?;

        Ok(Self {
            root,
            base_url,
            ticket_ttl_ms: i64::try_from(ticket_ttl_seconds.saturating_mul(1000))
                .unwrap_or(i64::MAX),
            max_bytes,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.blob_dir.clone(),
            &config.base_url(),
            config.upload_ticket_ttl_seconds,
            config.max_upload_bytes,
        )
    }

    /// Issues a single-use URL that accepts one blob transfer until it expires.
    pub fn request_upload_url(&self, database: &Database, now: i64) -> Result<Url> {
        database.purge_expired_upload_tickets(now)?;

        let token = Uuid::new_v4().simple().to_string();
        database.insert_upload_ticket(&token, now.saturating_add(self.ticket_ttl_ms))?;

        self.base_url
            .join(&format!("api/v1/upload/{token}"))
            .context("Failed to build upload URL")
    }

    pub fn accept_upload(
        &self,
        database: &Database,
        token: &str,
        bytes: &[u8],
        content_type: Option<&str>,
        name: Option<&str>,
        now: i64,
    ) -> StoreResult<BlobRow> {
        if !database.consume_upload_ticket(token, now)? {
            return Err(StoreError::NotFound(
                "Upload URL is unknown, expired or already used".to_string(),
            ));
        }

        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(StoreError::Oversize {
                size,
                limit: self.max_bytes,
            });
        }

        let blob_id = hex::encode(Sha256::digest(bytes));
        let path = self.blob_path(&blob_id);
        if !path.exists() {
            write_atomically(&path, bytes)?;
        }

        let blob = BlobRow {
            blob_id,
            name: file_name(name).unwrap_or(UNKNOWN_NAME).to_string(),
            size,
            content_type: non_blank(content_type).unwrap_or(OCTET_STREAM).to_string(),
            created_at: now,
        };
        database.upsert_blob(&blob)?;

        Ok(blob)
    }

    /// Metadata for a blob whose bytes are still present.
    pub fn metadata(&self, database: &Database, blob_id: &str) -> Result<Option<BlobRow>> {
        if !is_blob_id(blob_id) || !self.blob_path(blob_id).is_file() {
            return Ok(None);
        }

        database.blob(blob_id)
    }

    pub fn download_url(&self, database: &Database, blob_id: &str) -> Result<Option<Url>> {
        match self.metadata(database, blob_id)? {
            Some(blob) => self
                .base_url
                .join(&format!("api/v1/blobs/{}", blob.blob_id))
                .map(Some)
                .context("Failed to build download URL"),
            None => Ok(None),
        }
    }

    pub fn read(&self, database: &Database, blob_id: &str) -> StoreResult<(BlobRow, Vec<u8>)> {
        let blob = self
            .metadata(database, blob_id)?
            .ok_or_else(|| StoreError::NotFound(format!("Blob not found: {blob_id}")))?;

        let bytes = fs::read(self.blob_path(blob_id))
            .with_context(|| format!("Failed to read blob: {blob_id}"))?;

        Ok((blob, bytes))
    }

    fn blob_path(&self, blob_id: &str) -> PathBuf {
        self.root.join(&blob_id[..2]).join(blob_id)
    }
}

pub fn is_blob_id(value: &str) -> bool {
    value.len() == 64
        && value
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Last path component of a client-supplied name, never `.` or `..`.
fn file_name(name: Option<&str>) -> Option<&str> {
    let last = non_blank(name)?.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        last => Some(last),
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().context("Blob path has no parent directory")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create blob directory: {}", parent.display()))?;

    let staging = parent.join(format!(".{}.part", Uuid::new_v4().simple()));
    fs::write(&staging, bytes)
        .with_context(|| format!("Failed to write blob: {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("Failed to move blob into place: {}", path.display()))?;

    Ok(())
}
