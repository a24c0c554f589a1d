use std::{fmt, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::{database::table::column_decode, declare::TrendSource, util::datetime};

/// 熱門搜尋關鍵字，同一小時內會重複收集，讀取時再去重
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrendRecord {
    pub source: TrendSource,
    pub keyword: String,
    /// 從 1 開始，依來源文件中出現的順序
    pub rank: i64,
    pub collected_at: i64,
}

/// 查詢條件，all 或指定來源
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrendFilter {
    All,
    Source(TrendSource),
}

impl FromStr for TrendFilter {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(TrendFilter::All);
        }

        TrendSource::from_str(s).map(TrendFilter::Source)
    }
}

impl fmt::Display for TrendFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendFilter::All => f.write_str("all"),
            TrendFilter::Source(source) => write!(f, "{}", source),
        }
    }
}

impl TrendRecord {
    pub fn new(source: TrendSource, keyword: &str, rank: i64) -> Self {
        TrendRecord {
            source,
            keyword: keyword.to_string(),
            rank,
            collected_at: datetime::now_ms(),
        }
    }

    pub fn collected_at(mut self, ms: i64) -> Self {
        self.collected_at = ms;
        self
    }

    /// 在同一個 transaction 內新增多筆
    pub async fn insert_many(pool: &SqlitePool, records: &[TrendRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO trends (source, keyword, rank, collected_at) ");
        qb.push_values(records, |mut b, r| {
            b.push_bind(r.source.as_ref())
                .push_bind(&r.keyword)
                .push_bind(r.rank)
                .push_bind(r.collected_at);
        });
        let result = qb
            .build()
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to TrendRecord::insert_many({})", records.len()))?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    /// since 之後收集到的關鍵字，每個 (來源, 關鍵字) 取最小的 rank
    pub async fn current(
        pool: &SqlitePool,
        filter: TrendFilter,
        since: i64,
    ) -> Result<Vec<TrendRecord>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT source, keyword, MIN(rank) AS rank, MAX(collected_at) AS collected_at FROM trends WHERE collected_at >= ",
        );
        qb.push_bind(since);
        if let TrendFilter::Source(source) = filter {
            qb.push(" AND source = ").push_bind(source.to_string());
        }
        qb.push(" GROUP BY source, keyword ORDER BY source, rank, keyword");

        qb.build_query_as::<TrendRecord>()
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to TrendRecord::current({})", filter))
    }
}

impl FromRow<'_, SqliteRow> for TrendRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let source: String = row.try_get("source")?;
        Ok(TrendRecord {
            source: TrendSource::from_str(&source).map_err(|why| column_decode("source", why))?,
            keyword: row.try_get("keyword")?,
            rank: row.try_get("rank")?,
            collected_at: row.try_get("collected_at")?,
        })
    }
}
