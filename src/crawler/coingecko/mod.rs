use std::collections::HashMap;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{config::SETTINGS, util};

const HOST: &str = "api.coingecko.com";

/// simple/price 回應中單一幣種的韓圜報價
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CoinPrice {
    pub krw: Decimal,
    #[serde(default)]
    pub krw_24h_change: Option<Decimal>,
}

/// 取得多個幣種(coingecko id，例如 bitcoin)的韓圜報價與 24 小時漲跌幅
pub async fn visit(ids: &[&str]) -> Result<HashMap<String, CoinPrice>> {
    let url = format!(
        "https://{host}/api/v3/simple/price?ids={ids}&vs_currencies=krw&include_24hr_change=true",
        host = HOST,
        ids = urlencoding::encode(&ids.join(","))
    );

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if !SETTINGS.api.coingecko_key.is_empty() {
        if let Ok(key) = HeaderValue::from_str(&SETTINGS.api.coingecko_key) {
            headers.insert("x-cg-demo-api-key", key);
        }
    }

    util::http::get_json::<HashMap<String, CoinPrice>>(&url, Some(headers)).await
}
