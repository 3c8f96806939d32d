pub mod queries;

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: i64,
    pub text: String,
    pub date: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardRow {
    pub id: i64,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub id: i64,
    pub blob_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRow {
    pub blob_id: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set SQLite busy timeout")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn count_rows(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows in {}", table.name()))
    }

    pub fn insert_activity(&self, text: &str, date: i64, now: i64) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO activities (text, date, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![text, date, now],
            )
            .context("Failed to insert activity")?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_activities(&self) -> Result<Vec<ActivityRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, text, date, created_at, updated_at
             FROM activities
             ORDER BY id ASC",
        )?;

        let rows = statement
            .query_map([], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query activities")?;

        Ok(rows)
    }

    /// Returns the number of rows removed (0 or 1).
    pub fn delete_activity(&self, id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM activities WHERE id = ?1", params![id])
            .context("Failed to delete activity")
    }

    pub fn insert_clipboard(&self, text: &str, now: i64) -> Result<ClipboardRow> {
        self.conn
            .query_row(
                "INSERT INTO clipboard (text, created_at, updated_at) VALUES (?1, ?2, ?2)
                 RETURNING id, text, created_at, updated_at",
                params![text, now],
                clipboard_from_row,
            )
            .context("Failed to insert clipboard entry")
    }

    /// Returns the patched row, or `None` when `id` no longer exists.
    pub fn patch_clipboard(
        &self,
        id: i64,
        text: &str,
        now: i64,
    ) -> Result<Option<ClipboardRow>> {
        self.conn
            .query_row(
                "UPDATE clipboard SET text = ?2, updated_at = ?3 WHERE id = ?1
                 RETURNING id, text, created_at, updated_at",
                params![id, text, now],
                clipboard_from_row,
            )
            .optional()
            .context("Failed to patch clipboard entry")
    }

    pub fn latest_clipboard(&self) -> Result<Option<ClipboardRow>> {
        self.conn
            .query_row(
                "SELECT id, text, created_at, updated_at
                 FROM clipboard
                 ORDER BY updated_at DESC, id DESC
                 LIMIT 1",
                [],
                clipboard_from_row,
            )
            .optional()
            .context("Failed to query current clipboard entry")
    }

    pub fn delete_clipboard(&self, id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM clipboard WHERE id = ?1", params![id])
            .context("Failed to delete clipboard entry")
    }

    pub fn insert_file(&self, blob_id: &str, now: i64) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO files (blob_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![blob_id, now],
            )
            .context("Failed to insert file record")?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_files(&self) -> Result<Vec<FileRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, blob_id, created_at, updated_at
             FROM files
             ORDER BY id ASC",
        )?;

        let rows = statement
            .query_map([], file_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query files")?;

        Ok(rows)
    }

    pub fn upsert_blob(&self, blob: &BlobRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO blobs (blob_id, name, size, content_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(blob_id)
                 DO UPDATE SET name=excluded.name, content_type=excluded.content_type",
                params![
                    &blob.blob_id,
                    &blob.name,
                    blob.size as i64,
                    &blob.content_type,
                    blob.created_at
                ],
            )
            .context("Failed to upsert blob metadata")?;

        Ok(())
    }

    pub fn blob(&self, blob_id: &str) -> Result<Option<BlobRow>> {
        self.conn
            .query_row(
                "SELECT blob_id, name, size, content_type, created_at FROM blobs WHERE blob_id = ?1",
                params![blob_id],
                blob_from_row,
            )
            .optional()
            .context("Failed to query blob metadata")
    }

    pub fn insert_upload_ticket(&self, token: &str, expires_at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO upload_tickets (token, expires_at) VALUES (?1, ?2)",
                params![token, expires_at],
            )
            .context("Failed to insert upload ticket")?;

        Ok(())
    }

    /// Deletes the ticket if it is still valid; `true` means the caller owns it now.
    pub fn consume_upload_ticket(&self, token: &str, now: i64) -> Result<bool> {
        let consumed = self
            .conn
            .execute(
                "DELETE FROM upload_tickets WHERE token = ?1 AND expires_at >= ?2",
                params![token, now],
            )
            .context("Failed to consume upload ticket")?;

        Ok(consumed == 1)
    }

    pub fn purge_expired_upload_tickets(&self, now: i64) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM upload_tickets WHERE expires_at < ?1",
                params![now],
            )
            .context("Failed to purge expired upload tickets")
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Table {
    Activities,
    Clipboard,
    Files,
    Blobs,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Activities => "activities",
            Table::Clipboard => "clipboard",
            Table::Files => "files",
            Table::Blobs => "blobs",
        }
    }
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        text: non_empty_text(row, 1)?,
        date: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn clipboard_from_row(row: &Row<'_>) -> rusqlite::Result<ClipboardRow> {
    Ok(ClipboardRow {
        id: row.get(0)?,
        text: non_empty_text(row, 1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

// Blob ids are not validated here; a dangling or malformed id lists as an orphan.
fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        blob_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn blob_from_row(row: &Row<'_>) -> rusqlite::Result<BlobRow> {
    let size: i64 = row.get(2)?;
    let size = u64::try_from(size).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(error))
    })?;

    Ok(BlobRow {
        blob_id: row.get(0)?,
        name: row.get(1)?,
        size,
        content_type: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn non_empty_text(row: &Row<'_>, index: usize) -> rusqlite::Result<String> {
    let text: String = row.get(index)?;
    if text.trim().is_empty() {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            "empty text column".into(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::{Database, Table};
    use tempfile::tempdir;

    #[test]
    fn latest_clipboard_prefers_newest_update_over_insert_order() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        let first = database.insert_clipboard("first", 100).expect("insert").id;
        database.insert_clipboard("second", 200).expect("insert");
        database.patch_clipboard(first, "patched", 300).expect("patch");

        let current = database.latest_clipboard().expect("query").expect("entry");
        assert_eq!(current.id, first);
        assert_eq!(current.text, "patched");
        assert_eq!(database.count_rows(Table::Clipboard).expect("count"), 2);
    }

    #[test]
    fn upload_ticket_is_single_use_and_expires() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        database.insert_upload_ticket("fresh", 1_000).expect("insert");
        database.insert_upload_ticket("stale", 10).expect("insert");

        assert!(database.consume_upload_ticket("fresh", 500).expect("consume"));
        assert!(!database.consume_upload_ticket("fresh", 500).expect("consume"));
        assert!(!database.consume_upload_ticket("stale", 500).expect("consume"));
    }

    #[test]
    fn patch_returns_written_row_or_none_for_missing_id() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        let inserted = database.insert_clipboard("draft", 100).expect("insert");
        assert_eq!(inserted.text, "draft");
        assert_eq!(inserted.updated_at, 100);

        let patched = database
            .patch_clipboard(inserted.id, "final", 200)
            .expect("patch")
            .expect("row");
        assert_eq!(patched.created_at, 100);
        assert_eq!(patched.updated_at, 200);

        database.delete_clipboard(inserted.id).expect("delete");
        assert!(database.patch_clipboard(inserted.id, "gone", 300).expect("patch").is_none());
    }

    #[test]
    fn malformed_file_blob_id_still_lists() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        database.insert_file("not-a-blob", 1).expect("insert");

        let files = database.list_files().expect("list");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].blob_id, "not-a-blob");
    }

    #[test]
    fn schema_rejects_blank_activity_text() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        assert!(database.insert_activity("   ", 0, 0).is_err());
    }
}
