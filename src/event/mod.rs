use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    collector::CollectStatus,
    database::table::{price::PriceRecord, trend::TrendRecord},
};

pub use self::channel::ChannelSink;

/// 以 tokio broadcast 發送事件給 SSE 訂閱者
pub mod channel;

/// 收集結果的通知出口，發送即不理會結果，實作端自行記錄失敗
#[async_trait]
pub trait Sink: Send + Sync {
    async fn prices(&self, records: &[PriceRecord]);

    async fn trends(&self, records: &[TrendRecord]);

    async fn status(&self, status: &CollectStatus);
}

/// 對外發送的事件，名稱沿用前端訂閱的 price:update、trend:update、collect:status
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "price:update")]
    Prices(Vec<PriceRecord>),
    #[serde(rename = "trend:update")]
    Trends(Vec<TrendRecord>),
    #[serde(rename = "collect:status")]
    Status(CollectStatus),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Prices(_) => "price:update",
            Event::Trends(_) => "trend:update",
            Event::Status(_) => "collect:status",
        }
    }
}

/// 同一事件依序轉送給多個 sink
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Fanout {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Fanout { sinks }
    }
}

#[async_trait]
impl Sink for Fanout {
    async fn prices(&self, records: &[PriceRecord]) {
        for sink in &self.sinks {
            sink.prices(records).await;
        }
    }

    async fn trends(&self, records: &[TrendRecord]) {
        for sink in &self.sinks {
            sink.trends(records).await;
        }
    }

    async fn status(&self, status: &CollectStatus) {
        for sink in &self.sinks {
            sink.status(status).await;
        }
    }
}
