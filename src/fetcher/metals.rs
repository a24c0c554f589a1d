use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    calculation::conversion,
    crawler::{tradingeconomics, Quote},
    database::table::price::PriceRecord,
    declare::Category,
    fetcher::{persist_prices, Fetched, Fetcher},
    logging,
    store::Store,
};

/// 儲存的匯率與即時查詢都失敗時使用的 USD/KRW
pub const DEFAULT_USD_KRW: Decimal = dec!(1450);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Metal {
    Gold,
    Silver,
}

impl Metal {
    pub fn symbol(&self) -> &'static str {
        match self {
            Metal::Gold => "XAU",
            Metal::Silver => "XAG",
        }
    }

    /// tradingeconomics 的商品路徑
    fn page(&self) -> &'static str {
        match self {
            Metal::Gold => "gold",
            Metal::Silver => "silver",
        }
    }

    fn category(&self) -> Category {
        match self {
            Metal::Gold => Category::Gold,
            Metal::Silver => Category::Silver,
        }
    }
}

/// 金、銀每盎司美元報價換算成每돈(3.75g)韓圜
pub struct MetalFetcher {
    store: Arc<dyn Store>,
    metal: Metal,
}

impl MetalFetcher {
    pub fn new(store: Arc<dyn Store>, metal: Metal) -> Self {
        MetalFetcher { store, metal }
    }
}

#[async_trait]
impl Fetcher for MetalFetcher {
    fn name(&self) -> String {
        self.metal.page().to_string()
    }

    async fn fetch(&self) -> Result<Fetched> {
        let quote = tradingeconomics::visit_commodity(self.metal.page()).await?;
        let usd_krw = usd_krw(self.store.as_ref()).await;
        let record = to_record(self.metal, quote, usd_krw);

        persist_prices(self.store.as_ref(), std::slice::from_ref(&record)).await?;

        Ok(Fetched::Prices(vec![record]))
    }
}

pub(crate) fn to_record(metal: Metal, quote: Quote, usd_krw: Decimal) -> PriceRecord {
    PriceRecord::new(
        metal.category(),
        metal.symbol(),
        conversion::ounce_to_don(quote.price, usd_krw),
        "KRW",
    )
    .with_change(quote.change)
}

/// 依序嘗試：已儲存的 USD 匯率、tradingeconomics 即時匯率、預設值
pub async fn usd_krw(store: &dyn Store) -> Decimal {
    match store.latest_price("USD").await {
        Ok(Some(usd)) if usd.price > Decimal::ZERO => return usd.price,
        Ok(_) => {}
        Err(why) => {
            logging::warn_file_async(format!("Failed to read the stored USD/KRW because {:?}", why));
        }
    }

    match tradingeconomics::visit_usd_krw().await {
        Ok(rate) => rate,
        Err(why) => {
            logging::warn_file_async(format!(
                "Failed to visit USD/KRW because {:?}, use {} instead",
                why, DEFAULT_USD_KRW
            ));
            DEFAULT_USD_KRW
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Database;

    use super::*;

    #[test]
    fn test_to_record() {
        let quote = Quote {
            price: dec!(2600),
            change: Some(dec!(-0.35)),
        };
        let record = to_record(Metal::Gold, quote, dec!(1450));
        assert_eq!(record.symbol, "XAU");
        assert_eq!(record.category, Category::Gold);
        assert_eq!(record.price, dec!(454531));
        assert_eq!(record.change_percent, Some(dec!(-0.35)));
        assert_eq!(record.unit, "KRW");

        let silver = to_record(
            Metal::Silver,
            Quote {
                price: dec!(31.1035),
                change: None,
            },
            dec!(1000),
        );
        assert_eq!(silver.symbol, "XAG");
        assert_eq!(silver.price, dec!(3750));
        assert_eq!(silver.change_percent, None);
    }

    #[tokio::test]
    async fn test_usd_krw_prefers_stored_rate() {
        let db = Database::memory().await.unwrap();
        db.insert_price(&PriceRecord::new(Category::Exchange, "USD", dec!(1388.5), "KRW"))
            .await
            .unwrap();
        assert_eq!(usd_krw(&db).await, dec!(1388.5));
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch() {
        let db: Arc<dyn Store> = Arc::new(Database::memory().await.unwrap());
        let fetcher = MetalFetcher::new(db.clone(), Metal::Gold);
        match fetcher.fetch().await {
            Ok(fetched) => {
                logging::debug_file_async(format!("fetched : {:?}", fetched));
                assert!(db.latest_price("XAU").await.unwrap().is_some());
            }
            Err(why) => {
                logging::debug_file_async(format!("Failed to fetch because {:?}", why));
            }
        }
    }
}
