use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::{
    crawler::{google_trends, zum},
    database::table::trend::TrendRecord,
    declare::TrendSource,
    fetcher::{Fetched, Fetcher},
    store::Store,
};

/// 單一來源的熱門搜尋關鍵字，排名為 1 起算的順序
pub struct TrendFetcher {
    store: Arc<dyn Store>,
    source: TrendSource,
    pause_before: Option<Duration>,
}

impl TrendFetcher {
    pub fn new(store: Arc<dyn Store>, source: TrendSource) -> Self {
        TrendFetcher {
            store,
            source,
            pause_before: None,
        }
    }

    /// 開始請求前先等待，避免連續打同一批網站
    pub fn pause_before(mut self, pause: Duration) -> Self {
        self.pause_before = Some(pause);
        self
    }

    async fn keywords(&self) -> Result<Vec<String>> {
        match self.source.geo() {
            Some(geo) => google_trends::visit(geo).await,
            None => zum::visit().await,
        }
    }
}

#[async_trait]
impl Fetcher for TrendFetcher {
    fn name(&self) -> String {
        self.source.to_string()
    }

    async fn fetch(&self) -> Result<Fetched> {
        if let Some(pause) = self.pause_before {
            tokio::time::sleep(pause).await;
        }

        let keywords = self.keywords().await?;
        let records = to_records(self.source, &keywords);
        if records.is_empty() {
            return Err(anyhow!("no keyword from {}", self.source));
        }

        self.store.insert_trends(&records).await?;

        Ok(Fetched::Trends(records))
    }
}

fn to_records(source: TrendSource, keywords: &[String]) -> Vec<TrendRecord> {
    keywords
        .iter()
        .enumerate()
        .map(|(i, keyword)| TrendRecord::new(source, keyword, i as i64 + 1))
        .collect()
}
