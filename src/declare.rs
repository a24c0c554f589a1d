use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// 價格紀錄的分類
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// 黃金 XAU
    Gold,
    /// 白銀 XAG
    Silver,
    /// 汽油、柴油
    Oil,
    /// 匯率
    Exchange,
    /// 加密貨幣
    Crypto,
    /// 利率、CPI
    Economic,
}

/// 熱門搜尋關鍵字的來源
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrendSource {
    GoogleKr,
    GoogleUs,
    Zum,
}

impl TrendSource {
    /// Google Trends 的地區代碼，zum 沒有
    pub fn geo(&self) -> Option<&'static str> {
        match self {
            TrendSource::GoogleKr => Some("KR"),
            TrendSource::GoogleUs => Some("US"),
            TrendSource::Zum => None,
        }
    }
}

/// 收集群組，排程與 Collector 都以群組為單位運作
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Crypto,
    Metals,
    Exchange,
    Oil,
    Trends,
    Economic,
}

impl Group {
    /// 啟動時補收集的順序，金銀換算 KRW 需要最新的 USD/KRW，所以匯率排在金屬之前
    pub const RECONCILE_ORDER: [Group; 6] = [
        Group::Exchange,
        Group::Metals,
        Group::Crypto,
        Group::Oil,
        Group::Trends,
        Group::Economic,
    ];

    /// settings 表內記錄最後收集時間的 key
    pub fn setting_key(&self) -> String {
        format!("last_collect_{}", self.as_ref())
    }

    /// 收集週期
    pub fn interval(&self) -> Duration {
        match self {
            Group::Crypto => Duration::from_secs(10 * 60),
            Group::Metals | Group::Exchange | Group::Trends => Duration::from_secs(30 * 60),
            Group::Oil | Group::Economic => Duration::from_secs(6 * 60 * 60),
        }
    }

    /// 對齊時鐘的 cron 表示式
    //                 sec  min   hour   day of month   month   day of week
    pub fn cron(&self) -> &'static str {
        match self {
            // 00, 10, 20, 30, 40, 50 分
            Group::Crypto => "0 */10 * * * *",
            // 00, 30 分
            Group::Metals | Group::Exchange | Group::Trends => "0 0,30 * * * *",
            // 00, 06, 12, 18 時
            Group::Oil | Group::Economic => "0 0 0,6,12,18 * * *",
        }
    }
}
