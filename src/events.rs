use crate::db::Table;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Patched,
    Deleted,
}

/// Notice that a table changed; subscribers re-query the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }
}

impl ChangeFeed {
    pub fn publish(&self, table: Table, kind: ChangeKind, id: impl ToString) {
        let event = ChangeEvent {
            table: table.name(),
            kind,
            id: id.to_string(),
        };

        // No subscribers is not an error.
        if let Err(error) = self.sender.send(event) {
            debug!(table = error.0.table, "change event dropped without subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeFeed, ChangeKind};
    use crate::db::Table;

    #[tokio::test]
    async fn every_subscriber_sees_each_write() {
        let feed = ChangeFeed::default();
        let mut first = feed.subscribe();
        let mut second = feed.subscribe();

        feed.publish(Table::Clipboard, ChangeKind::Patched, 7);

        let seen_first = first.recv().await.expect("first event");
        let seen_second = second.recv().await.expect("second event");
        assert_eq!(seen_first, seen_second);
        assert_eq!(seen_first.table, "clipboard");
        assert_eq!(seen_first.id, "7");
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let feed = ChangeFeed::default();
        feed.publish(Table::Files, ChangeKind::Inserted, "abc");
    }
}
