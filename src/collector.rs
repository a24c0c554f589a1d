use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::{
    database::table::{price::PriceRecord, trend::TrendRecord},
    declare::Group,
    event::Sink,
    fetcher::{self, FetchOutcome, Fetched, Fetcher},
    logging,
    store::Store,
    util::datetime,
};

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// 所有 fetcher 都成功
    Complete,
    /// 至少一個 fetcher 失敗
    Partial,
}

/// 一個群組收集完成後對外發送的狀態
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CollectStatus {
    pub category: Group,
    pub status: Status,
    /// 價格筆數加關鍵字筆數
    pub count: usize,
    pub errors: Vec<String>,
}

/// 一次群組收集的結果
#[derive(Debug, Clone)]
pub struct Collection {
    pub group: Group,
    pub prices: Vec<PriceRecord>,
    pub trends: Vec<TrendRecord>,
    pub errors: Vec<String>,
}

impl Collection {
    pub fn new(group: Group) -> Self {
        Collection {
            group,
            prices: Vec::new(),
            trends: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.prices.len() + self.trends.len()
    }

    pub fn status(&self) -> CollectStatus {
        CollectStatus {
            category: self.group,
            status: if self.errors.is_empty() {
                Status::Complete
            } else {
                Status::Partial
            },
            count: self.count(),
            errors: self.errors.clone(),
        }
    }
}

/// 依序執行一個群組的 fetcher，記錄最後收集時間，彙整每日統計後通知 sink
pub struct Collector {
    store: Arc<dyn Store>,
    sink: Arc<dyn Sink>,
    tz: Tz,
}

impl Collector {
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn Sink>, tz: Tz) -> Self {
        Collector { store, sink, tz }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// 不會失敗，單一 fetcher 的錯誤只會成為 errors 裡的一行
    pub async fn run(&self, group: Group, fetchers: &[Arc<dyn Fetcher>]) -> Collection {
        logging::info_file_async(format!("{} collection started with {} fetchers", group, fetchers.len()));

        let mut collection = Collection::new(group);
        for f in fetchers {
            match fetcher::settle(f.as_ref()).await {
                FetchOutcome::Success(Fetched::Prices(prices)) => collection.prices.extend(prices),
                FetchOutcome::Success(Fetched::Trends(trends)) => collection.trends.extend(trends),
                FetchOutcome::Failure(why) => {
                    logging::error_file_async(format!("{} collection: {}", group, why));
                    collection.errors.push(why);
                }
            }
        }

        let now = datetime::now_ms();
        if let Err(why) = self
            .store
            .set_setting(&group.setting_key(), &now.to_string())
            .await
        {
            logging::error_file_async(format!(
                "Failed to set {} because {:?}",
                group.setting_key(),
                why
            ));
        }

        self.summarize(&collection.prices).await;

        if !collection.prices.is_empty() {
            self.sink.prices(&collection.prices).await;
        }

        if !collection.trends.is_empty() {
            self.sink.trends(&collection.trends).await;
        }

        let status = collection.status();
        self.sink.status(&status).await;

        logging::info_file_async(format!(
            "{} collection finished: {} count:{} errors:{}",
            group,
            status.status,
            status.count,
            status.errors.len()
        ));

        collection
    }

    /// 依收集時間在設定時區的日期累計每日統計
    async fn summarize(&self, prices: &[PriceRecord]) {
        for price in prices {
            let date = match datetime::local_date(price.collected_at, self.tz) {
                Some(date) => date,
                None => continue,
            };

            if let Err(why) = self
                .store
                .upsert_daily_summary(&price.symbol, date, price.price)
                .await
            {
                logging::error_file_async(format!(
                    "Failed to upsert the daily summary of {} because {:?}",
                    price.symbol, why
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        database::Database,
        declare::TrendSource,
        event::tests::RecordingSink,
        fetcher::tests::{price, Stub, StubFetcher},
    };

    use super::*;

    /// 上次收集時間必須是整數毫秒，且不早於 since
    async fn assert_stamped_since(store: &dyn Store, group: Group, since: i64) {
        let value = store
            .get_setting(&group.setting_key())
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("{} is not stamped", group.setting_key()));
        let stamped: i64 = value.parse().unwrap();
        assert!(stamped >= since, "{} < {}", stamped, since);
        assert!(stamped <= datetime::now_ms());
    }

    async fn collector() -> (Collector, Arc<dyn Store>, Arc<RecordingSink>) {
        let store: Arc<dyn Store> = Arc::new(Database::memory().await.unwrap());
        let sink = Arc::new(RecordingSink::default());
        (
            Collector::new(store.clone(), sink.clone(), chrono_tz::Asia::Seoul),
            store,
            sink,
        )
    }

    #[tokio::test]
    async fn test_all_fail_is_partial_and_still_stamped() {
        let (collector, store, sink) = collector().await;
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            StubFetcher::new("gold", Stub::Fail("timeout")),
            StubFetcher::new("silver", Stub::Fail("selector changed")),
        ];

        let before = datetime::now_ms();
        let collection = collector.run(Group::Metals, &fetchers).await;
        let status = collection.status();

        assert_eq!(status.status, Status::Partial);
        assert_eq!(status.count, 0);
        assert_eq!(status.errors.len(), 2);
        assert_stamped_since(store.as_ref(), Group::Metals, before).await;
        assert_eq!(sink.names(), vec!["collect:status"]);
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let (collector, store, sink) = collector().await;
        let ok = StubFetcher::new("gold", Stub::Prices(vec![price("XAU", dec!(454531))]));
        let trends = StubFetcher::new(
            "zum",
            Stub::Trends(vec![TrendRecord::new(TrendSource::Zum, "날씨", 1)]),
        );
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            ok.clone(),
            StubFetcher::new("silver", Stub::Panic),
            trends,
            StubFetcher::new("diesel", Stub::Empty),
        ];

        let before = datetime::now_ms();
        let collection = collector.run(Group::Metals, &fetchers).await;
        assert_stamped_since(store.as_ref(), Group::Metals, before).await;

        assert_eq!(collection.prices.len(), 1);
        assert_eq!(collection.trends.len(), 1);
        assert_eq!(collection.errors.len(), 2);
        assert_eq!(ok.calls(), 1);

        let status = collection.status();
        assert_eq!(status.status, Status::Partial);
        assert_eq!(status.count, 2);
        assert_eq!(sink.names(), vec!["price:update", "trend:update", "collect:status"]);
        assert_eq!(sink.statuses()[0], status);

        let tz = chrono_tz::Asia::Seoul;
        let today = datetime::local_date(collection.prices[0].collected_at, tz).unwrap();
        let history = store.price_history("XAU", 30, tz).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].time, today.format("%Y-%m-%d").to_string());
    }

    #[tokio::test]
    async fn test_all_success_is_complete() {
        let (collector, _, _) = collector().await;
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![StubFetcher::new(
            "crypto",
            Stub::Prices(vec![price("BTC", dec!(1)), price("ETH", dec!(2))]),
        )];

        let status = collector.run(Group::Crypto, &fetchers).await.status();
        assert_eq!(status.status, Status::Complete);
        assert_eq!(status.count, 2);
        assert!(status.errors.is_empty());
    }
}
