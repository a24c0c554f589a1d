use std::collections::HashMap;

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::util;

const HOST: &str = "api.exchangerate-api.com";

/// 以 base 為基準，1 base 可換得的各貨幣數量
#[derive(Deserialize, Debug, Clone)]
pub struct LatestRates {
    pub base: String,
    pub rates: HashMap<String, Decimal>,
}

impl LatestRates {
    pub fn rate(&self, currency: &str) -> Result<Decimal> {
        self.rates
            .get(currency)
            .copied()
            .filter(|r| *r > Decimal::ZERO)
            .ok_or_else(|| anyhow!("{} is missing in the {} rate table", currency, self.base))
    }
}

/// 取得以美元為基準的最新匯率表
pub async fn visit() -> Result<LatestRates> {
    let url = format!("https://{host}/v4/latest/USD", host = HOST);
    util::http::get_json::<LatestRates>(&url, None).await
}
