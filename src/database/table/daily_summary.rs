use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Executor, FromRow, Row, Sqlite, SqlitePool};

use crate::{
    database::table::{column_decode, decimal_column, price::PriceRecord},
    util::datetime,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// 每個代號每天一筆的 OHLC 彙總
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub symbol: String,
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg: Decimal,
    pub sample_count: i64,
}

impl DailySummary {
    /// 當日第一筆價格
    pub fn first(symbol: &str, date: NaiveDate, price: Decimal) -> Self {
        DailySummary {
            symbol: symbol.to_string(),
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            avg: price,
            sample_count: 1,
        }
    }

    /// 併入一筆新價格
    pub fn accumulate(&mut self, price: Decimal) {
        let count = Decimal::from(self.sample_count);
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.avg = ((self.avg * count + price) / (count + Decimal::ONE)).normalize();
        self.sample_count += 1;
    }

    /// executor 可以是連線池或 transaction
    pub async fn find<'e, E>(executor: E, symbol: &str, date: NaiveDate) -> Result<Option<DailySummary>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = r#"
SELECT symbol, date, open, high, low, close, avg, sample_count
FROM daily_summary
WHERE symbol = ? AND date = ?;
"#;
        sqlx::query_as::<_, DailySummary>(sql)
            .bind(symbol)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_optional(executor)
            .await
            .with_context(|| format!("Failed to DailySummary::find({}, {})", symbol, date))
    }

    /// 讀出當日彙總、併入價格後寫回，整個過程在同一個 transaction。
    /// 以 BEGIN IMMEDIATE 開始，先取得寫入鎖再讀，其他連線寫入中時會等 busy_timeout
    pub async fn upsert(
        pool: &SqlitePool,
        symbol: &str,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<DailySummary> {
        let mut tx = pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .with_context(|| format!("Failed to DailySummary::upsert({}, {}) begin", symbol, date))?;
        let day = date.format(DATE_FORMAT).to_string();

        let current = Self::find(&mut *tx, symbol, date).await?;

        let summary = match current {
            Some(mut summary) => {
                summary.accumulate(price);
                summary
            }
            None => DailySummary::first(symbol, date, price),
        };

        let sql = r#"
INSERT INTO daily_summary (symbol, date, open, high, low, close, avg, sample_count)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (symbol, date) DO UPDATE SET
    high = excluded.high,
    low = excluded.low,
    close = excluded.close,
    avg = excluded.avg,
    sample_count = excluded.sample_count;
"#;
        sqlx::query(sql)
            .bind(&summary.symbol)
            .bind(&day)
            .bind(summary.open.to_string())
            .bind(summary.high.to_string())
            .bind(summary.low.to_string())
            .bind(summary.close.to_string())
            .bind(summary.avg.to_string())
            .bind(summary.sample_count)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to DailySummary::upsert({:?})", summary))?;
        tx.commit().await?;

        Ok(summary)
    }

    /// 最近 days 天的彙總，由舊到新
    pub async fn recent(pool: &SqlitePool, symbol: &str, days: i64) -> Result<Vec<DailySummary>> {
        let sql = r#"
SELECT symbol, date, open, high, low, close, avg, sample_count
FROM daily_summary
WHERE symbol = ?
ORDER BY date DESC
LIMIT ?;
"#;
        let mut rows = sqlx::query_as::<_, DailySummary>(sql)
            .bind(symbol)
            .bind(days)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to DailySummary::recent({}, {})", symbol, days))?;
        rows.reverse();

        Ok(rows)
    }
}

impl FromRow<'_, SqliteRow> for DailySummary {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let date: String = row.try_get("date")?;
        Ok(DailySummary {
            symbol: row.try_get("symbol")?,
            date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|why| column_decode("date", why))?,
            open: decimal_column(row, "open")?,
            high: decimal_column(row, "high")?,
            low: decimal_column(row, "low")?,
            close: decimal_column(row, "close")?,
            avg: decimal_column(row, "avg")?,
            sample_count: row.try_get("sample_count")?,
        })
    }
}

/// 走勢圖的一個點，有每日彙總時用彙總，沒有時用原始價格
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub time: String,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg: Decimal,
}

impl From<DailySummary> for PricePoint {
    fn from(s: DailySummary) -> Self {
        PricePoint {
            time: s.date.format(DATE_FORMAT).to_string(),
            open: Some(s.open),
            high: Some(s.high),
            low: Some(s.low),
            close: s.close,
            avg: s.avg,
        }
    }
}

impl PricePoint {
    pub fn from_price(record: &PriceRecord, tz: Tz) -> Self {
        let time = datetime::from_ms(record.collected_at, tz)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        PricePoint {
            time,
            open: None,
            high: None,
            low: None,
            close: record.price,
            avg: record.price,
        }
    }
}
