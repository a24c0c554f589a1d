use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    calculation::conversion,
    crawler::{exchangerate_api::LatestRates, investing},
    database::table::price::PriceRecord,
    declare::Category,
    fetcher::{persist_prices, Fetched, Fetcher},
    logging,
    store::Store,
};

/// (代號, 報價單位, investing.com 的貨幣對)
const CURRENCIES: [(&str, u32, &str); 6] = [
    ("USD", 1, "usd-krw"),
    ("EUR", 1, "eur-krw"),
    ("JPY", 100, "jpy-krw"),
    ("CNY", 1, "cny-krw"),
    ("RUB", 1, "rub-krw"),
    ("VND", 100, "vnd-krw"),
];

/// 以美元為基準的匯率表推算各貨幣對韓圜匯率，漲跌幅另外從 investing.com 取得
pub struct ExchangeFetcher {
    store: Arc<dyn Store>,
    courtesy: Duration,
}

impl ExchangeFetcher {
    pub fn new(store: Arc<dyn Store>, courtesy: Duration) -> Self {
        ExchangeFetcher { store, courtesy }
    }

    /// 依序取得每個貨幣對的漲跌幅，請求之間間隔 courtesy，失敗的貨幣對沒有漲跌幅
    async fn changes(&self) -> HashMap<&'static str, Decimal> {
        let mut changes = HashMap::with_capacity(CURRENCIES.len());

        for (i, (symbol, _, pair)) in CURRENCIES.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.courtesy).await;
            }

            match investing::visit_change(pair).await {
                Ok(Some(change)) => {
                    changes.insert(*symbol, change);
                }
                Ok(None) => {
                    logging::warn_file_async(format!("can't find the {} change from investing", pair));
                }
                Err(why) => {
                    logging::warn_file_async(format!("Failed to visit the {} change because {:?}", pair, why));
                }
            }
        }

        changes
    }
}

#[async_trait]
impl Fetcher for ExchangeFetcher {
    fn name(&self) -> String {
        "exchange".to_string()
    }

    async fn fetch(&self) -> Result<Fetched> {
        let rates = crate::crawler::exchangerate_api::visit().await?;
        let changes = self.changes().await;
        let records = to_records(&rates, &changes)?;

        persist_prices(self.store.as_ref(), &records).await?;

        Ok(Fetched::Prices(records))
    }
}

/// 匯率表裡沒有 KRW 時整批失敗，其他貨幣缺少時只略過該貨幣
pub(crate) fn to_records(
    rates: &LatestRates,
    changes: &HashMap<&'static str, Decimal>,
) -> Result<Vec<PriceRecord>> {
    let usd_krw = rates.rate("KRW")?;
    let mut records = Vec::with_capacity(CURRENCIES.len());

    for (symbol, per, _) in CURRENCIES.iter() {
        let units_per_usd = if *symbol == "USD" {
            Decimal::ONE
        } else {
            match rates.rate(symbol) {
                Ok(rate) => rate,
                Err(why) => {
                    logging::warn_file_async(format!("skip {} because {:?}", symbol, why));
                    continue;
                }
            }
        };

        let price = conversion::cross_rate(usd_krw, units_per_usd, Decimal::from(*per))
            .ok_or_else(|| anyhow!("can't convert {} with {}", symbol, units_per_usd))?;

        records.push(
            PriceRecord::new(Category::Exchange, symbol, price, "KRW")
                .with_change(changes.get(symbol).copied()),
        );
    }

    Ok(records)
}
