use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::{
    calculation::conversion,
    crawler::coingecko::{self, CoinPrice},
    database::table::price::PriceRecord,
    declare::Category,
    fetcher::{persist_prices, Fetched, Fetcher},
    logging,
    store::Store,
};

/// (coingecko id, 代號)
const COINS: [(&str, &str); 2] = [("bitcoin", "BTC"), ("ethereum", "ETH")];

pub struct CryptoFetcher {
    store: Arc<dyn Store>,
}

impl CryptoFetcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        CryptoFetcher { store }
    }
}

#[async_trait]
impl Fetcher for CryptoFetcher {
    fn name(&self) -> String {
        "crypto".to_string()
    }

    async fn fetch(&self) -> Result<Fetched> {
        let ids: Vec<&str> = COINS.iter().map(|(id, _)| *id).collect();
        let prices = coingecko::visit(&ids).await?;
        let records = to_records(&prices);
        if records.is_empty() {
            return Err(anyhow!("coingecko returned none of {:?}", ids));
        }

        persist_prices(self.store.as_ref(), &records).await?;

        Ok(Fetched::Prices(records))
    }
}

/// 24 小時漲跌幅取到小數第二位
fn to_records(prices: &HashMap<String, CoinPrice>) -> Vec<PriceRecord> {
    COINS
        .iter()
        .filter_map(|(id, symbol)| match prices.get(*id) {
            Some(coin) => Some(
                PriceRecord::new(Category::Crypto, symbol, coin.krw, "KRW")
                    .with_change(coin.krw_24h_change.map(|c| conversion::round_half_up(c, 2))),
            ),
            None => {
                logging::warn_file_async(format!("{} is missing in the coingecko response", id));
                None
            }
        })
        .collect()
}
