pub const CREATE_ACTIVITIES: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  text        TEXT NOT NULL CHECK (length(trim(text)) > 0),
  date        INTEGER NOT NULL,
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_CLIPBOARD: &str = r#"
CREATE TABLE IF NOT EXISTS clipboard (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  text        TEXT NOT NULL CHECK (length(trim(text)) > 0),
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_FILES: &str = r#"
CREATE TABLE IF NOT EXISTS files (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  blob_id     TEXT NOT NULL,
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_BLOBS: &str = r#"
CREATE TABLE IF NOT EXISTS blobs (
  blob_id       TEXT PRIMARY KEY,
  name          TEXT NOT NULL,
  size          INTEGER NOT NULL,
  content_type  TEXT NOT NULL,
  created_at    INTEGER NOT NULL
);
"#;

pub const CREATE_UPLOAD_TICKETS: &str = r#"
CREATE TABLE IF NOT EXISTS upload_tickets (
  token       TEXT PRIMARY KEY,
  expires_at  INTEGER NOT NULL
);
"#;

pub const INDEX_CLIPBOARD_UPDATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_clipboard_updated_at ON clipboard(updated_at);";

pub const INDEX_FILES_BLOB_ID: &str =
    "CREATE INDEX IF NOT EXISTS idx_files_blob_id ON files(blob_id);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_ACTIVITIES,
        CREATE_CLIPBOARD,
        CREATE_FILES,
        CREATE_BLOBS,
        CREATE_UPLOAD_TICKETS,
        INDEX_CLIPBOARD_UPDATED_AT,
        INDEX_FILES_BLOB_ID,
    ]
}
