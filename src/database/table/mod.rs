use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

/// 每日彙總 OHLC
pub mod daily_summary;
/// 價格紀錄
pub mod price;
/// 系統設定
pub mod setting;
/// 熱門搜尋關鍵字
pub mod trend;

/// 取出 TEXT 欄位並轉為 Decimal
pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text).map_err(|why| column_decode(column, why))
}

pub(crate) fn optional_decimal_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| Decimal::from_str(&t).map_err(|why| column_decode(column, why)))
        .transpose()
}

/// 解析 enum 或日期等欄位失敗時轉成 sqlx 的錯誤
pub(crate) fn column_decode<E>(column: &str, why: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(why),
    }
}
