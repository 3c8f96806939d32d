pub mod upload;

use crate::blob::{BlobStore, OCTET_STREAM, UNKNOWN_NAME, is_blob_id};
use crate::db::{Database, FileRow};
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct NewFile {
    pub blob_id: String,
}

/// A file record joined with the live metadata of its blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileView {
    #[serde(flatten)]
    pub file: FileRow,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

impl FileView {
    fn orphan(file: FileRow) -> Self {
        Self {
            file,
            name: UNKNOWN_NAME.to_string(),
            size: 0,
            content_type: OCTET_STREAM.to_string(),
        }
    }
}

/// Lists file records in store order, joining blob metadata at read time.
///
/// Records whose blob is gone are listed with placeholder metadata instead of
/// failing the whole listing.
pub fn list_files(database: &Database, blobs: &BlobStore) -> StoreResult<Vec<FileView>> {
    let views = database
        .list_files()?
        .into_iter()
        .map(|file| match blobs.metadata(database, &file.blob_id) {
            Ok(Some(blob)) => FileView {
                file,
                name: blob.name,
                size: blob.size,
                content_type: blob.content_type,
            },
            Ok(None) => FileView::orphan(file),
            Err(error) => {
                warn!(blob_id = %file.blob_id, error = %error, "blob metadata lookup failed");
                FileView::orphan(file)
            }
        })
        .collect();

    Ok(views)
}

pub fn register_file(
    database: &Database,
    blobs: &BlobStore,
    input: &NewFile,
    now: i64,
) -> StoreResult<i64> {
    let blob_id = input.blob_id.trim();
    if !is_blob_id(blob_id) {
        return Err(StoreError::Validation(format!("Malformed blob id: {blob_id}")));
    }

    if blobs.metadata(database, blob_id)?.is_none() {
        return Err(StoreError::NotFound(format!("Blob not found: {blob_id}")));
    }

    Ok(database.insert_file(blob_id, now)?)
}
