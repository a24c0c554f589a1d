use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqlitePool};

use crate::{
    database::table::{column_decode, decimal_column, optional_decimal_column},
    declare::Category,
    util::datetime,
};

const COLUMNS: &str =
    "id, category, symbol, price, change_percent, change_amount, unit, collected_at";

/// 一筆收集到的價格，只會新增不會修改
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    #[serde(default)]
    pub id: i64,
    pub category: Category,
    /// 例如 XAU、BTC、USD
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// 漲跌幅(%)
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub change_percent: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub change_amount: Option<Decimal>,
    pub unit: String,
    /// epoch 毫秒
    pub collected_at: i64,
}

impl PriceRecord {
    pub fn new(category: Category, symbol: &str, price: Decimal, unit: &str) -> Self {
        PriceRecord {
            id: 0,
            category,
            symbol: symbol.to_string(),
            price,
            change_percent: None,
            change_amount: None,
            unit: unit.to_string(),
            collected_at: datetime::now_ms(),
        }
    }

    pub fn with_change(mut self, change_percent: Option<Decimal>) -> Self {
        self.change_percent = change_percent;
        self
    }

    pub fn with_change_amount(mut self, change_amount: Option<Decimal>) -> Self {
        self.change_amount = change_amount;
        self
    }

    pub fn collected_at(mut self, ms: i64) -> Self {
        self.collected_at = ms;
        self
    }

    /// 新增一筆紀錄，回傳 rowid
    pub async fn insert(&self, pool: &SqlitePool) -> Result<i64> {
        let sql = r#"
INSERT INTO prices (category, symbol, price, change_percent, change_amount, unit, collected_at)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#;
        let result = sqlx::query(sql)
            .bind(self.category.as_ref())
            .bind(&self.symbol)
            .bind(self.price.to_string())
            .bind(self.change_percent.map(|d| d.to_string()))
            .bind(self.change_amount.map(|d| d.to_string()))
            .bind(&self.unit)
            .bind(self.collected_at)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to PriceRecord::insert({:?})", self))?;

        Ok(result.last_insert_rowid())
    }

    /// 指定代號最新的一筆
    pub async fn latest(pool: &SqlitePool, symbol: &str) -> Result<Option<PriceRecord>> {
        let sql = format!(
            "SELECT {} FROM prices WHERE symbol = ? ORDER BY collected_at DESC, id DESC LIMIT 1",
            COLUMNS
        );
        sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(symbol)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to PriceRecord::latest({})", symbol))
    }

    /// 每個代號各取收集時間最新的一筆，時間相同時取 id 較大者
    pub async fn latest_per_symbol(pool: &SqlitePool) -> Result<Vec<PriceRecord>> {
        let sql = r#"
SELECT p.id, p.category, p.symbol, p.price, p.change_percent, p.change_amount, p.unit, p.collected_at
FROM prices p
WHERE p.id = (
    SELECT q.id
    FROM prices q
    WHERE q.symbol = p.symbol
    ORDER BY q.collected_at DESC, q.id DESC
    LIMIT 1
)
ORDER BY p.category, p.symbol;
"#;
        sqlx::query_as::<_, PriceRecord>(sql)
            .fetch_all(pool)
            .await
            .context("Failed to PriceRecord::latest_per_symbol")
    }

    /// 指定時間之後的紀錄，由舊到新
    pub async fn since(pool: &SqlitePool, symbol: &str, since: i64) -> Result<Vec<PriceRecord>> {
        let sql = format!(
            "SELECT {} FROM prices WHERE symbol = ? AND collected_at >= ? ORDER BY collected_at, id",
            COLUMNS
        );
        sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(symbol)
            .bind(since)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to PriceRecord::since({}, {})", symbol, since))
    }

    /// 最近 limit 筆，由舊到新
    pub async fn recent(pool: &SqlitePool, symbol: &str, limit: i64) -> Result<Vec<PriceRecord>> {
        let sql = format!(
            "SELECT {} FROM prices WHERE symbol = ? ORDER BY collected_at DESC, id DESC LIMIT ?",
            COLUMNS
        );
        let mut records = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(symbol)
            .bind(limit)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to PriceRecord::recent({}, {})", symbol, limit))?;
        records.reverse();

        Ok(records)
    }
}

impl FromRow<'_, SqliteRow> for PriceRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let category: String = row.try_get("category")?;
        Ok(PriceRecord {
            id: row.try_get("id")?,
            category: Category::from_str(&category).map_err(|why| column_decode("category", why))?,
            symbol: row.try_get("symbol")?,
            price: decimal_column(row, "price")?,
            change_percent: optional_decimal_column(row, "change_percent")?,
            change_amount: optional_decimal_column(row, "change_amount")?,
            unit: row.try_get("unit")?,
            collected_at: row.try_get("collected_at")?,
        })
    }
}
