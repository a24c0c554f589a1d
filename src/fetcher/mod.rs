use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;

use crate::{
    database::table::{price::PriceRecord, trend::TrendRecord},
    declare::{Group, TrendSource},
    logging,
    store::Store,
};

pub use self::{
    crypto::CryptoFetcher,
    economic::EconomicFetcher,
    exchange::ExchangeFetcher,
    fuel::{Fuel, FuelFetcher},
    metals::{Metal, MetalFetcher},
    trends::TrendFetcher,
};

/// 加密貨幣
pub mod crypto;
/// 利率、CPI
pub mod economic;
/// 匯率
pub mod exchange;
/// 汽油、柴油
pub mod fuel;
/// 金、銀
pub mod metals;
/// 熱門搜尋關鍵字
pub mod trends;

/// 一次成功收集的結果
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Prices(Vec<PriceRecord>),
    Trends(Vec<TrendRecord>),
}

impl Fetched {
    pub fn len(&self) -> usize {
        match self {
            Fetched::Prices(p) => p.len(),
            Fetched::Trends(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 單一 fetcher 的結果，失敗只帶訊息
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Fetched),
    Failure(String),
}

/// 一個資料來源，成功時先寫入 Store 再回傳
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> String;

    async fn fetch(&self) -> Result<Fetched>;
}

/// 每個群組要執行的 fetcher，依執行順序排列
pub type Plans = HashMap<Group, Vec<Arc<dyn Fetcher>>>;

/// 執行 fetcher，把錯誤、空結果與 panic 一律轉成 Failure
pub async fn settle(fetcher: &dyn Fetcher) -> FetchOutcome {
    let name = fetcher.name();
    match AssertUnwindSafe(fetcher.fetch()).catch_unwind().await {
        Ok(Ok(fetched)) if fetched.is_empty() => {
            FetchOutcome::Failure(format!("{}: nothing was collected", name))
        }
        Ok(Ok(fetched)) => FetchOutcome::Success(fetched),
        Ok(Err(why)) => FetchOutcome::Failure(format!("{}: {:#}", name, why)),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            logging::error_file_async(format!("{} panicked: {}", name, reason));
            FetchOutcome::Failure(format!("{}: panicked: {}", name, reason))
        }
    }
}

/// 依序寫入價格，任何一筆失敗就回傳錯誤
pub(crate) async fn persist_prices(store: &dyn Store, records: &[PriceRecord]) -> Result<()> {
    for record in records {
        store.insert_price(record).await?;
    }

    Ok(())
}

/// 預設的群組與資料來源對應
pub fn plans(store: Arc<dyn Store>, courtesy: Duration) -> Plans {
    let mut plans: Plans = HashMap::with_capacity(6);

    plans.insert(
        Group::Crypto,
        vec![Arc::new(CryptoFetcher::new(store.clone()))],
    );
    plans.insert(
        Group::Metals,
        vec![
            Arc::new(MetalFetcher::new(store.clone(), Metal::Gold)),
            Arc::new(MetalFetcher::new(store.clone(), Metal::Silver)),
        ],
    );
    plans.insert(
        Group::Exchange,
        vec![Arc::new(ExchangeFetcher::new(store.clone(), courtesy))],
    );
    plans.insert(
        Group::Oil,
        vec![
            Arc::new(FuelFetcher::new(store.clone(), Fuel::Gasoline)),
            Arc::new(FuelFetcher::new(store.clone(), Fuel::Diesel)),
        ],
    );
    plans.insert(
        Group::Trends,
        vec![
            Arc::new(TrendFetcher::new(store.clone(), TrendSource::GoogleKr)),
            Arc::new(TrendFetcher::new(store.clone(), TrendSource::GoogleUs).pause_before(courtesy)),
            Arc::new(TrendFetcher::new(store.clone(), TrendSource::Zum).pause_before(courtesy)),
        ],
    );
    plans.insert(Group::Economic, vec![Arc::new(EconomicFetcher::new(store))]);

    plans
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    use crate::{database::Database, declare::Category};

    use super::*;

    /// 測試用的 fetcher，依設定回傳固定結果並記錄被呼叫的次數
    pub(crate) enum Stub {
        Prices(Vec<PriceRecord>),
        Trends(Vec<TrendRecord>),
        Fail(&'static str),
        Empty,
        Panic,
    }

    pub(crate) struct StubFetcher {
        pub name: &'static str,
        pub stub: Stub,
        pub calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn new(name: &'static str, stub: Stub) -> Arc<Self> {
            Arc::new(StubFetcher {
                name,
                stub,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        fn name(&self) -> String {
            self.name.to_string()
        }

        async fn fetch(&self) -> Result<Fetched> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.stub {
                Stub::Prices(p) => Ok(Fetched::Prices(p.clone())),
                Stub::Trends(t) => Ok(Fetched::Trends(t.clone())),
                Stub::Fail(msg) => Err(anyhow!("{}", msg)),
                Stub::Empty => Ok(Fetched::Prices(Vec::new())),
                Stub::Panic => panic!("selector exploded"),
            }
        }
    }

    pub(crate) fn price(symbol: &str, price: rust_decimal::Decimal) -> PriceRecord {
        PriceRecord::new(Category::Gold, symbol, price, "KRW")
    }

    #[tokio::test]
    async fn test_settle() {
        let ok = StubFetcher::new("gold", Stub::Prices(vec![price("XAU", dec!(1))]));
        assert!(matches!(settle(ok.as_ref()).await, FetchOutcome::Success(Fetched::Prices(p)) if p.len() == 1));

        let fail = StubFetcher::new("silver", Stub::Fail("timeout"));
        assert_eq!(
            settle(fail.as_ref()).await,
            FetchOutcome::Failure("silver: timeout".to_string())
        );

        let empty = StubFetcher::new("zum", Stub::Empty);
        assert!(matches!(settle(empty.as_ref()).await, FetchOutcome::Failure(m) if m.contains("nothing")));

        let panic = StubFetcher::new("naver", Stub::Panic);
        assert!(matches!(settle(panic.as_ref()).await, FetchOutcome::Failure(m) if m.contains("selector exploded")));
    }

    #[tokio::test]
    async fn test_plans_cover_every_group() {
        let store: Arc<dyn Store> = Arc::new(Database::memory().await.unwrap());
        let plans = plans(store, Duration::from_millis(500));
        for group in Group::iter() {
            assert!(!plans[&group].is_empty(), "{} has no fetcher", group);
        }
        assert_eq!(plans[&Group::Metals].len(), 2);
        assert_eq!(plans[&Group::Trends].len(), 3);
        assert_eq!(plans[&Group::Metals][0].name(), "gold");
    }
}
