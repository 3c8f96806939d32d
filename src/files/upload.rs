use crate::error::StoreError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use url::Url;

/// The three round trips of an upload: ticket, transfer, registration.
pub trait UploadGateway {
    async fn request_upload_url(&self) -> Result<Url, StoreError>;

    /// Sends the bytes to a previously issued upload URL and returns the blob id.
    async fn transfer(&self, url: &Url, item: &UploadItem, bytes: Vec<u8>)
    -> Result<String, StoreError>;

    async fn register_file(&self, blob_id: &str) -> Result<i64, StoreError>;
}

#[derive(Debug, Clone)]
pub struct UploadItem {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub path: PathBuf,
}

impl UploadItem {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string(),
            size: metadata.len(),
            path: path.to_path_buf(),
        })
    }

    fn load(&self) -> Result<Vec<u8>, StoreError> {
        fs::read(&self.path)
            .with_context(|| format!("Failed to read file: {}", self.path.display()))
            .map_err(StoreError::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded {
        name: String,
        blob_id: String,
        file_id: i64,
    },
    Skipped {
        name: String,
        size: u64,
        limit: u64,
    },
    Failed {
        name: String,
        error: String,
    },
}

/// Uploads each item independently.
///
/// Items above `max_bytes` are skipped before any round trip. A failure on one
/// item is recorded and the batch moves on to the next.
pub async fn upload_batch<G: UploadGateway>(
    gateway: &G,
    items: &[UploadItem],
    max_bytes: u64,
) -> Vec<UploadOutcome> {
    let mut outcomes = Vec::with_capacity(items.len());

    for item in items {
        if item.size > max_bytes {
            warn!(
                file = %item.name,
                size = item.size,
                limit = max_bytes,
                "file is too large, skipping"
            );
            outcomes.push(UploadOutcome::Skipped {
                name: item.name.clone(),
                size: item.size,
                limit: max_bytes,
            });
            continue;
        }

        match upload_one(gateway, item).await {
            Ok((blob_id, file_id)) => {
                info!(file = %item.name, blob_id = %blob_id, file_id, "file uploaded");
                outcomes.push(UploadOutcome::Uploaded {
                    name: item.name.clone(),
                    blob_id,
                    file_id,
                });
            }
            Err(upload_error) => {
                error!(file = %item.name, error = %upload_error, "file upload failed");
                outcomes.push(UploadOutcome::Failed {
                    name: item.name.clone(),
                    error: upload_error.to_string(),
                });
            }
        }
    }

    outcomes
}

async fn upload_one<G: UploadGateway>(
    gateway: &G,
    item: &UploadItem,
) -> Result<(String, i64), StoreError> {
    let bytes = item.load()?;
    let url = gateway.request_upload_url().await?;
    let blob_id = gateway.transfer(&url, item, bytes).await?;
    let file_id = gateway.register_file(&blob_id).await?;

    Ok((blob_id, file_id))
}

#[cfg(test)]
mod tests {
    use super::{UploadGateway, UploadItem, UploadOutcome, upload_batch};
    use crate::blob::BlobStore;
    use crate::db::Database;
    use crate::error::StoreError;
    use crate::files::{NewFile, list_files, register_file};
    use std::fs::File;
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};
    use url::Url;

    const MIB: u64 = 1024 * 1024;

    struct LocalGateway {
        db_path: PathBuf,
        blobs: BlobStore,
        fail_on: Option<String>,
    }

    impl UploadGateway for LocalGateway {
        async fn request_upload_url(&self) -> Result<Url, StoreError> {
            let database = Database::open(&self.db_path)?;
            Ok(self.blobs.request_upload_url(&database, 0)?)
        }

        async fn transfer(
            &self,
            url: &Url,
            item: &UploadItem,
            bytes: Vec<u8>,
        ) -> Result<String, StoreError> {
            if self.fail_on.as_deref() == Some(item.name.as_str()) {
                return Err(StoreError::Transfer("connection reset".to_string()));
            }

            let database = Database::open(&self.db_path)?;
            let token = url.path().rsplit('/').next().unwrap_or_default();
            let blob = self.blobs.accept_upload(
                &database,
                token,
                &bytes,
                Some(&item.content_type),
                Some(&item.name),
                1,
            )?;
            Ok(blob.blob_id)
        }

        async fn register_file(&self, blob_id: &str) -> Result<i64, StoreError> {
            let database = Database::open(&self.db_path)?;
            register_file(
                &database,
                &self.blobs,
                &NewFile {
                    blob_id: blob_id.to_string(),
                },
                2,
            )
        }
    }

    fn gateway(dir: &TempDir, fail_on: Option<&str>) -> LocalGateway {
        LocalGateway {
            db_path: dir.path().join("daybook.db"),
            blobs: BlobStore::new(dir.path().join("blobs"), "http://127.0.0.1:7891", 60, 10 * MIB)
                .expect("blob store"),
            fail_on: fail_on.map(ToOwned::to_owned),
        }
    }

    fn sized_file(dir: &Path, name: &str, size: u64) -> UploadItem {
        let path = dir.join(name);
        File::create(&path)
            .and_then(|file| file.set_len(size))
            .expect("create sized file");
        UploadItem::from_path(&path).expect("upload item")
    }

    #[tokio::test]
    async fn oversize_file_is_skipped_and_the_rest_upload() {
        let dir = tempdir().expect("tempdir");
        let gateway = gateway(&dir, None);
        let items = vec![
            sized_file(dir.path(), "huge.bin", 15 * MIB),
            sized_file(dir.path(), "small.bin", 2 * MIB),
        ];

        let outcomes = upload_batch(&gateway, &items, 10 * MIB).await;

        assert!(matches!(
            &outcomes[0],
            UploadOutcome::Skipped { name, size, .. } if name == "huge.bin" && *size == 15 * MIB
        ));
        assert!(matches!(&outcomes[1], UploadOutcome::Uploaded { name, .. } if name == "small.bin"));

        let database = Database::open(&gateway.db_path).expect("open db");
        let files = list_files(&database, &gateway.blobs).expect("list");
        let names = files.iter().map(|file| file.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["small.bin"]);
        assert_eq!(files[0].size, 2 * MIB);
    }

    #[tokio::test]
    async fn one_failed_transfer_does_not_stop_the_batch() {
        let dir = tempdir().expect("tempdir");
        let gateway = gateway(&dir, Some("flaky.txt"));
        let items = vec![
            sized_file(dir.path(), "flaky.txt", 10),
            sized_file(dir.path(), "steady.txt", 20),
        ];

        let outcomes = upload_batch(&gateway, &items, 10 * MIB).await;

        assert!(matches!(&outcomes[0], UploadOutcome::Failed { name, .. } if name == "flaky.txt"));
        assert!(matches!(&outcomes[1], UploadOutcome::Uploaded { name, .. } if name == "steady.txt"));
    }

    #[test]
    fn content_type_is_guessed_from_extension() {
        let dir = tempdir().expect("tempdir");
        let item = sized_file(dir.path(), "photo.png", 3);

        assert_eq!(item.content_type, "image/png");
        assert_eq!(item.size, 3);
    }
}
