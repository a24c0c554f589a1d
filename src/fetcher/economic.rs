use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    crawler::{investing, naver},
    database::table::price::PriceRecord,
    declare::Category,
    fetcher::{persist_prices, Fetched, Fetcher},
    logging,
    store::Store,
};

/// 抓不到時使用的韓國基準利率
const FALLBACK_RATE_KR: Decimal = dec!(3.0);
/// 抓不到時使用的美國基準利率
const FALLBACK_RATE_US: Decimal = dec!(4.5);
/// 統計廳每月公布一次，沒有穩定的來源可抓，固定值
const CPI_KR: Decimal = dec!(1.9);
const CPI_US: Decimal = dec!(2.7);

/// 基準利率與 CPI，盡力而為，抓不到就用預設值，所以永遠回傳四筆
pub struct EconomicFetcher {
    store: Arc<dyn Store>,
}

impl EconomicFetcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        EconomicFetcher { store }
    }
}

#[async_trait]
impl Fetcher for EconomicFetcher {
    fn name(&self) -> String {
        "economic".to_string()
    }

    async fn fetch(&self) -> Result<Fetched> {
        let (kr, us) = tokio::join!(naver::visit_korea_rate(), investing::visit_us_rate());

        let kr = kr
            .map_err(|why| {
                logging::warn_file_async(format!(
                    "Failed to visit the Korea base rate because {:?}, use {} instead",
                    why, FALLBACK_RATE_KR
                ));
            })
            .ok();
        let us = us
            .map_err(|why| {
                logging::warn_file_async(format!(
                    "Failed to visit the US base rate because {:?}, use {} instead",
                    why, FALLBACK_RATE_US
                ));
            })
            .ok();

        let records = to_records(kr, us);
        persist_prices(self.store.as_ref(), &records).await?;

        Ok(Fetched::Prices(records))
    }
}

fn to_records(rate_kr: Option<Decimal>, rate_us: Option<Decimal>) -> Vec<PriceRecord> {
    [
        ("RATE_KR", rate_kr.unwrap_or(FALLBACK_RATE_KR)),
        ("RATE_US", rate_us.unwrap_or(FALLBACK_RATE_US)),
        ("CPI_KR", CPI_KR),
        ("CPI_US", CPI_US),
    ]
    .iter()
    .map(|(symbol, value)| PriceRecord::new(Category::Economic, symbol, *value, "%"))
    .collect()
}
