use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::logging;

pub mod table;

/// 建表語法，重複執行不影響既有資料
const MIGRATIONS: [&str; 7] = [
    r#"
CREATE TABLE IF NOT EXISTS prices (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    category       TEXT    NOT NULL,
    symbol         TEXT    NOT NULL,
    price          TEXT    NOT NULL,
    change_percent TEXT,
    change_amount  TEXT,
    unit           TEXT    NOT NULL DEFAULT 'KRW',
    collected_at   INTEGER NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_prices_symbol_collected ON prices (symbol, collected_at)",
    r#"
CREATE TABLE IF NOT EXISTS daily_summary (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol       TEXT    NOT NULL,
    date         TEXT    NOT NULL,
    open         TEXT    NOT NULL,
    high         TEXT    NOT NULL,
    low          TEXT    NOT NULL,
    close        TEXT    NOT NULL,
    avg          TEXT    NOT NULL,
    sample_count INTEGER NOT NULL DEFAULT 1,
    UNIQUE (symbol, date)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS trends (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    source       TEXT    NOT NULL,
    keyword      TEXT    NOT NULL,
    rank         INTEGER NOT NULL,
    collected_at INTEGER NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_trends_source_collected ON trends (source, collected_at)",
    r#"
CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    value      TEXT    NOT NULL,
    updated_at INTEGER NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_daily_summary_symbol_date ON daily_summary (symbol, date)",
];

/// SQLite 連線池封裝，所有資料表的讀寫都經由這裡
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 開啟(不存在時建立)資料庫檔案並執行建表
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path))?;

        let db = Database { pool };
        db.migrate().await?;
        logging::info_file_async(format!("database {} is ready", path));

        Ok(db)
    }

    /// 私有的記憶體資料庫，只有一條連線，連線關閉資料即消失
    pub async fn memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Database { pool };
        db.migrate().await?;

        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        for sql in MIGRATIONS {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to migrate: {}", sql.trim()))?;
        }

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::memory().await.unwrap();
        db.migrate().await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        for table in ["daily_summary", "prices", "settings", "trends"] {
            assert!(names.contains(&table), "{} missing in {:?}", table, names);
        }
    }

    #[tokio::test]
    async fn test_open_file() {
        let dir = std::env::temp_dir().join(format!("infohouse-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("test.db");
        let db = Database::open(&path.to_string_lossy()).await.unwrap();
        assert!(path.exists());
        db.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
