use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    collector::CollectStatus,
    database::table::{price::PriceRecord, trend::TrendRecord},
    event::{Event, Sink},
};

/// 沒有訂閱者時 send 會失敗，直接忽略
#[derive(Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<Event>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        ChannelSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn prices(&self, records: &[PriceRecord]) {
        self.publish(Event::Prices(records.to_vec()));
    }

    async fn trends(&self, records: &[TrendRecord]) {
        self.publish(Event::Trends(records.to_vec()));
    }

    async fn status(&self, status: &CollectStatus) {
        self.publish(Event::Status(status.clone()));
    }
}

#[cfg(test)]
mod tests {
    use crate::{collector::Status, declare::Group};

    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscriber() {
        let sink = ChannelSink::default();
        sink.prices(&[]).await;

        let mut rx = sink.subscribe();
        let status = CollectStatus {
            category: Group::Oil,
            status: Status::Complete,
            count: 2,
            errors: vec![],
        };
        sink.status(&status).await;

        assert_eq!(rx.recv().await.unwrap(), Event::Status(status));
    }
}
