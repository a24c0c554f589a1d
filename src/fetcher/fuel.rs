use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    crawler::{globalpetrolprices, Quote},
    database::table::price::PriceRecord,
    declare::Category,
    fetcher::{persist_prices, Fetched, Fetcher},
    store::Store,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fuel {
    Gasoline,
    Diesel,
}

impl Fuel {
    pub fn symbol(&self) -> &'static str {
        match self {
            Fuel::Gasoline => "GASOLINE",
            Fuel::Diesel => "DIESEL",
        }
    }

    fn page(&self) -> &'static str {
        match self {
            Fuel::Gasoline => "gasoline",
            Fuel::Diesel => "diesel",
        }
    }
}

/// 南韓每公升油價
pub struct FuelFetcher {
    store: Arc<dyn Store>,
    fuel: Fuel,
}

impl FuelFetcher {
    pub fn new(store: Arc<dyn Store>, fuel: Fuel) -> Self {
        FuelFetcher { store, fuel }
    }
}

#[async_trait]
impl Fetcher for FuelFetcher {
    fn name(&self) -> String {
        self.fuel.page().to_string()
    }

    async fn fetch(&self) -> Result<Fetched> {
        let quote = globalpetrolprices::visit(self.fuel.page()).await?;
        let record = to_record(self.fuel, quote);

        persist_prices(self.store.as_ref(), std::slice::from_ref(&record)).await?;

        Ok(Fetched::Prices(vec![record]))
    }
}

fn to_record(fuel: Fuel, quote: Quote) -> PriceRecord {
    PriceRecord::new(Category::Oil, fuel.symbol(), quote.price, "KRW").with_change(quote.change)
}
