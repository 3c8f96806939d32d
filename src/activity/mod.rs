pub mod filter;
pub mod markdown;

use crate::db::{ActivityRow, Database};
use crate::error::{StoreError, StoreResult, require_text};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
    pub text: String,
    /// "Occurred on" timestamp in epoch milliseconds.
    pub date: i64,
}

/// An activity as shown in the list, with its text already rendered.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: ActivityRow,
    pub html: String,
}

impl From<ActivityRow> for ActivityView {
    fn from(activity: ActivityRow) -> Self {
        let html = markdown::render_inline_markdown(&activity.text);
        Self { activity, html }
    }
}

pub fn add_activity(database: &Database, input: &NewActivity, now: i64) -> StoreResult<i64> {
    let text = require_text("text", &input.text)?;
    Ok(database.insert_activity(&text, input.date, now)?)
}

pub fn list_activities(database: &Database) -> StoreResult<Vec<ActivityRow>> {
    Ok(database.list_activities()?)
}

pub fn delete_activity(database: &Database, id: i64) -> StoreResult<()> {
    match database.delete_activity(id)? {
        0 => Err(StoreError::NotFound(format!("Activity not found: {id}"))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{NewActivity, add_activity, delete_activity, list_activities};
    use crate::db::Database;
    use crate::error::StoreError;
    use tempfile::tempdir;

    #[test]
    fn add_trims_text_and_keeps_caller_date() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        let input = NewActivity {
            text: "  shipped **v2**  ".to_string(),
            date: 42,
        };
        let id = add_activity(&database, &input, 1_000).expect("add");

        let rows = list_activities(&database).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].text, "shipped **v2**");
        assert_eq!(rows[0].date, 42);
        assert_eq!(rows[0].created_at, 1_000);
        assert_eq!(rows[0].updated_at, 1_000);
    }

    #[test]
    fn blank_text_is_rejected_before_touching_the_store() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        let input = NewActivity {
            text: " \n\t ".to_string(),
            date: 0,
        };
        let result = add_activity(&database, &input, 0);

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(list_activities(&database).expect("list").is_empty());
    }

    #[test]
    fn delete_removes_row_and_repeat_delete_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("daybook.db")).expect("open db");

        let keep = add_activity(
            &database,
            &NewActivity {
                text: "keep".to_string(),
                date: 1,
            },
            1,
        )
        .expect("add");
        let drop = add_activity(
            &database,
            &NewActivity {
                text: "drop".to_string(),
                date: 2,
            },
            2,
        )
        .expect("add");

        delete_activity(&database, drop).expect("first delete");

        let remaining = list_activities(&database)
            .expect("list")
            .into_iter()
            .map(|row| row.id)
            .collect::<Vec<_>>();
        assert_eq!(remaining, vec![keep]);

        let repeat = delete_activity(&database, drop);
        assert!(matches!(repeat, Err(StoreError::NotFound(_))));
    }
}
