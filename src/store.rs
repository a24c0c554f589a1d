use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::{
    database::{
        table::{
            daily_summary::{DailySummary, PricePoint},
            price::PriceRecord,
            setting::Setting,
            trend::{TrendFilter, TrendRecord},
        },
        Database,
    },
    util::datetime,
};

/// 熱門關鍵字只看最近一小時
pub const TREND_WINDOW_MS: i64 = 60 * 60 * 1000;

/// 收集流程依賴的持久化介面，不綁定特定的儲存引擎
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_price(&self, record: &PriceRecord) -> Result<()>;

    async fn latest_price(&self, symbol: &str) -> Result<Option<PriceRecord>>;

    /// 每個代號一筆，收集時間最新者
    async fn all_latest_prices(&self) -> Result<Vec<PriceRecord>>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn insert_trends(&self, records: &[TrendRecord]) -> Result<()>;

    /// 最近一小時內，每個 (來源, 關鍵字) 取最小 rank
    async fn trends(&self, filter: TrendFilter) -> Result<Vec<TrendRecord>>;

    async fn upsert_daily_summary(&self, symbol: &str, date: NaiveDate, price: Decimal)
        -> Result<()>;

    /// 近 days 天的走勢，優先使用每日彙總，沒有彙總時退回原始價格(days × 24 筆)
    async fn price_history(&self, symbol: &str, days: i64, tz: Tz) -> Result<Vec<PricePoint>>;

    /// since(epoch 毫秒) 之後的價格，由舊到新
    async fn prices_since(&self, symbol: &str, since: i64) -> Result<Vec<PriceRecord>>;
}

#[async_trait]
impl Store for Database {
    async fn insert_price(&self, record: &PriceRecord) -> Result<()> {
        record.insert(self.pool()).await.map(|_| ())
    }

    async fn latest_price(&self, symbol: &str) -> Result<Option<PriceRecord>> {
        PriceRecord::latest(self.pool(), symbol).await
    }

    async fn all_latest_prices(&self) -> Result<Vec<PriceRecord>> {
        PriceRecord::latest_per_symbol(self.pool()).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(Setting::first(self.pool(), key).await?.map(|s| s.value))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        Setting::new(key, value).upsert(self.pool()).await
    }

    async fn insert_trends(&self, records: &[TrendRecord]) -> Result<()> {
        TrendRecord::insert_many(self.pool(), records).await.map(|_| ())
    }

    async fn trends(&self, filter: TrendFilter) -> Result<Vec<TrendRecord>> {
        let since = datetime::now_ms() - TREND_WINDOW_MS;
        TrendRecord::current(self.pool(), filter, since).await
    }

    async fn upsert_daily_summary(
        &self,
        symbol: &str,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<()> {
        DailySummary::upsert(self.pool(), symbol, date, price)
            .await
            .map(|_| ())
    }

    async fn price_history(&self, symbol: &str, days: i64, tz: Tz) -> Result<Vec<PricePoint>> {
        let summaries = DailySummary::recent(self.pool(), symbol, days).await?;
        if !summaries.is_empty() {
            return Ok(summaries.into_iter().map(PricePoint::from).collect());
        }

        let prices = PriceRecord::recent(self.pool(), symbol, days * 24).await?;
        Ok(prices
            .iter()
            .map(|p| PricePoint::from_price(p, tz))
            .collect())
    }

    async fn prices_since(&self, symbol: &str, since: i64) -> Result<Vec<PriceRecord>> {
        PriceRecord::since(self.pool(), symbol, since).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::declare::{Category, TrendSource};

    use super::*;

    #[tokio::test]
    async fn test_latest_prices_one_per_symbol() {
        let db = Database::memory().await.unwrap();
        let now = datetime::now_ms();
        let (t1, t2, t3) = (now - 3_000, now - 2_000, now - 1_000);

        db.insert_price(&PriceRecord::new(Category::Gold, "A", dec!(1), "KRW").collected_at(t1))
            .await
            .unwrap();
        db.insert_price(&PriceRecord::new(Category::Gold, "B", dec!(2), "KRW").collected_at(t2))
            .await
            .unwrap();
        db.insert_price(&PriceRecord::new(Category::Gold, "A", dec!(3), "KRW").collected_at(t3))
            .await
            .unwrap();

        let latest = db.all_latest_prices().await.unwrap();
        assert_eq!(latest.len(), 2);
        let a = latest.iter().find(|r| r.symbol == "A").unwrap();
        assert_eq!(a.collected_at, t3);
        assert_eq!(a.price, dec!(3));
        let b = latest.iter().find(|r| r.symbol == "B").unwrap();
        assert_eq!(b.collected_at, t2);

        assert_eq!(db.latest_price("A").await.unwrap().unwrap().price, dec!(3));
    }

    #[tokio::test]
    async fn test_trends_dedup_within_last_hour() {
        let db = Database::memory().await.unwrap();
        let now = datetime::now_ms();

        db.insert_trends(&[TrendRecord::new(TrendSource::Zum, "X", 3).collected_at(now - 10_000)])
            .await
            .unwrap();
        db.insert_trends(&[TrendRecord::new(TrendSource::Zum, "X", 1).collected_at(now - 5_000)])
            .await
            .unwrap();

        let zum = db.trends(TrendFilter::Source(TrendSource::Zum)).await.unwrap();
        assert_eq!(zum.len(), 1);
        assert_eq!(zum[0].keyword, "X");
        assert_eq!(zum[0].rank, 1);
    }

    #[tokio::test]
    async fn test_settings() {
        let db = Database::memory().await.unwrap();
        assert_eq!(db.get_setting("last_collect_crypto").await.unwrap(), None);
        db.set_setting("last_collect_crypto", "123").await.unwrap();
        assert_eq!(
            db.get_setting("last_collect_crypto").await.unwrap().as_deref(),
            Some("123")
        );
    }

    #[tokio::test]
    async fn test_price_history_falls_back_to_raw_prices() {
        let db = Database::memory().await.unwrap();
        let tz = chrono_tz::Asia::Seoul;

        for (price, at) in [(dec!(10), 0), (dec!(11), 60_000)] {
            db.insert_price(&PriceRecord::new(Category::Crypto, "ETH", price, "KRW").collected_at(at))
                .await
                .unwrap();
        }
        let raw = db.price_history("ETH", 1, tz).await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].time, "1970-01-01 09:00");
        assert_eq!(raw[1].close, dec!(11));

        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        db.upsert_daily_summary("ETH", date, dec!(12)).await.unwrap();
        let daily = db.price_history("ETH", 30, tz).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].time, "2026-10-19");
        assert_eq!(daily[0].high, Some(dec!(12)));
    }
}
