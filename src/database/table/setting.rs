use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::util::datetime;

/// 設定表 `settings` 的資料列，last-write-wins
#[derive(sqlx::FromRow, Default, Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

impl Setting {
    pub fn new(key: &str, value: &str) -> Self {
        Setting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: datetime::now_ms(),
        }
    }

    /// 取得指定 key，不存在時回傳 None
    pub async fn first(pool: &SqlitePool, key: &str) -> Result<Option<Setting>> {
        sqlx::query_as::<_, Setting>("SELECT key, value, updated_at FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to Setting::first({:?}) from database", key))
    }

    /// 新增或更新
    pub async fn upsert(&self, pool: &SqlitePool) -> Result<()> {
        let sql = r#"
INSERT INTO settings (key, value, updated_at)
VALUES (?, ?, ?)
ON CONFLICT (key)
DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;"#;
        sqlx::query(sql)
            .bind(&self.key)
            .bind(&self.value)
            .bind(self.updated_at)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to Setting::upsert({:?}) from database", self))?;

        Ok(())
    }
}
