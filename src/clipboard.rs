use crate::db::{ClipboardRow, Database};
use crate::error::{StoreError, StoreResult, require_text};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ClipboardUpdate {
    /// Id of the entry the caller last saw, if any.
    pub id: Option<i64>,
    pub text: String,
}

/// Writes the shared clipboard.
///
/// A known id patches that row in place; no id inserts a fresh row. Exactly one
/// of the two happens. Concurrent writers race with last-write-wins.
pub fn upsert(
    database: &Database,
    update: &ClipboardUpdate,
    now: i64,
) -> StoreResult<ClipboardRow> {
    let text = require_text("text", &update.text)?;

    match update.id {
        Some(id) => database
            .patch_clipboard(id, &text, now)?
            .ok_or_else(|| StoreError::NotFound(format!("Clipboard entry not found: {id}"))),
        None => Ok(database.insert_clipboard(&text, now)?),
    }
}

/// The entry with the newest `updated_at`, regardless of physical row order.
pub fn current(database: &Database) -> StoreResult<Option<ClipboardRow>> {
    Ok(database.latest_clipboard()?)
}

pub fn clear(database: &Database, id: i64) -> StoreResult<()> {
    match database.delete_clipboard(id)? {
        0 => Err(StoreError::NotFound(format!(
            "Clipboard entry not found: {id}"
        ))),
        _ => Ok(()),
    }
}
