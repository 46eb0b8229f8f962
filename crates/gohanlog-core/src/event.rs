// ABOUTME: Change notifications published after every committed mutation of the store.
// ABOUTME: UI subscribers re-run their queries when an event touches a table they display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Logs,
    Tags,
}

/// What happened. Each variant carries only the ids a subscriber needs to
/// decide whether to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    LogCreated { log_id: i64 },
    LogUpdated { log_id: i64 },
    LogDeleted { log_id: i64 },
    LogsCleared,
    TagCreated { tag_id: i64 },
    TagRenamed { tag_id: i64, merged_into: Option<i64> },
    TagEmojiChanged { tag_id: i64 },
    TagDeleted { tag_id: i64 },
    BackupImported { logs: usize, tags: usize },
}

impl Operation {
    /// Tables whose contents this operation may have changed.
    pub fn tables(&self) -> &'static [Table] {
        match self {
            Operation::LogCreated { .. }
            | Operation::LogUpdated { .. }
            | Operation::LogDeleted { .. }
            | Operation::LogsCleared
            | Operation::TagRenamed { .. }
            | Operation::BackupImported { .. } => &[Table::Logs, Table::Tags],
            Operation::TagCreated { .. }
            | Operation::TagEmojiChanged { .. }
            | Operation::TagDeleted { .. } => &[Table::Tags],
        }
    }
}

/// A committed change, stamped with the time it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn now(operation: Operation) -> Self {
        Self {
            operation,
            timestamp: Utc::now(),
        }
    }

    pub fn touches(&self, table: Table) -> bool {
        self.operation.tables().contains(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_mutations_touch_both_tables() {
        let event = ChangeEvent::now(Operation::LogUpdated { log_id: 4 });
        assert!(event.touches(Table::Logs));
        assert!(event.touches(Table::Tags));
    }

    #[test]
    fn tag_deletion_leaves_logs_alone() {
        let event = ChangeEvent::now(Operation::TagDeleted { tag_id: 2 });
        assert!(event.touches(Table::Tags));
        assert!(!event.touches(Table::Logs));
    }

    #[test]
    fn operation_serializes_with_type_tag() {
        let json = serde_json::to_value(Operation::TagRenamed {
            tag_id: 1,
            merged_into: Some(9),
        })
        .unwrap();
        assert_eq!(json["type"], "TagRenamed");
        assert_eq!(json["merged_into"], 9);
    }
}
