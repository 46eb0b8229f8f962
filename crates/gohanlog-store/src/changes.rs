// ABOUTME: Broadcast feed of committed changes so UI layers can re-run their queries.
// ABOUTME: The data layer keeps no subscription state beyond the channel itself.

use gohanlog_core::{ChangeEvent, Operation};
use tokio::sync::broadcast;

/// Default buffer size of the change channel. Slow subscribers that fall
/// further behind than this see a `Lagged` error and should simply re-query.
pub const DEFAULT_CAPACITY: usize = 256;

/// Publishes a [`ChangeEvent`] after each successful mutation.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, operation: Operation) {
        // No subscribers is fine
        let _ = self.tx.send(ChangeEvent::now(operation));
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use gohanlog_core::Table;
    use tokio_stream::wrappers::BroadcastStream;

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::default();
        feed.publish(Operation::LogsCleared);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let feed = ChangeFeed::new(8);
        let mut stream = BroadcastStream::new(feed.subscribe());

        feed.publish(Operation::TagCreated { tag_id: 1 });
        feed.publish(Operation::LogDeleted { log_id: 2 });

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.operation, Operation::TagCreated { tag_id: 1 });
        assert!(!first.touches(Table::Logs));
        assert_eq!(second.operation, Operation::LogDeleted { log_id: 2 });
        assert!(second.touches(Table::Logs));
    }
}
