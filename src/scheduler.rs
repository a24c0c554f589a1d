use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Result;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::{
    collector::{Collection, Collector},
    database::table::price::PriceRecord,
    declare::Group,
    fetcher::Plans,
    logging,
    store::Store,
    util::datetime,
};

/// 已排入的 cron 工作
struct Armed {
    sched: JobScheduler,
    jobs: Vec<Uuid>,
}

/// 每個群組一個獨立的 cron 工作，同一群組同時只會有一次收集在執行
pub struct Scheduler {
    collector: Arc<Collector>,
    plans: Arc<Plans>,
    tz: Tz,
    busy: Arc<HashMap<Group, Arc<Mutex<()>>>>,
    armed: Mutex<Option<Armed>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Scheduler {
    pub fn new(collector: Arc<Collector>, plans: Plans, tz: Tz) -> Self {
        let busy = Group::RECONCILE_ORDER
            .iter()
            .map(|g| (*g, Arc::new(Mutex::new(()))))
            .collect();

        Scheduler {
            collector,
            plans: Arc::new(plans),
            tz,
            busy: Arc::new(busy),
            armed: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// 先補收集逾期的群組，再依時鐘排入每個群組的 cron 工作。
    /// 只有第一次呼叫有效，stop 之後也不會再啟動
    pub async fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            logging::warn_file_async("scheduler is stopped, skip the start".to_string());
            return Ok(());
        }

        if self.started.swap(true, Ordering::SeqCst) {
            logging::warn_file_async("scheduler is already started".to_string());
            return Ok(());
        }

        self.catch_up().await;

        let mut armed = self.armed.lock().await;
        if armed.is_some() {
            logging::warn_file_async("scheduler is already started".to_string());
            return Ok(());
        }

        if self.stopped.load(Ordering::SeqCst) {
            logging::info_file_async("scheduler was stopped during the catch-up".to_string());
            return Ok(());
        }

        let sched = JobScheduler::new().await?;
        let mut jobs = Vec::with_capacity(Group::RECONCILE_ORDER.len());

        //                 sec  min   hour   day of month   month   day of week
        for group in Group::RECONCILE_ORDER {
            let job = self.create_job(group)?;
            jobs.push(sched.add(job).await?);
            logging::info_file_async(format!("{} is scheduled at {} ({})", group, group.cron(), self.tz));
        }

        sched.start().await?;
        *armed = Some(Armed { sched, jobs });

        Ok(())
    }

    /// 移除所有工作並關閉排程，正在執行中的收集不會被中斷
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        let mut armed = match self.armed.lock().await.take() {
            Some(armed) => armed,
            None => return,
        };

        for id in &armed.jobs {
            if let Err(why) = armed.sched.remove(id).await {
                logging::error_file_async(format!("Failed to remove the job({}) because {:?}", id, why));
            }
        }

        if let Err(why) = armed.sched.shutdown().await {
            logging::error_file_async(format!("Failed to shutdown the scheduler because {:?}", why));
        }

        logging::info_file_async("scheduler stopped".to_string());
    }

    /// 依補收集順序手動執行所有群組，前一次還在執行的群組會等它結束
    pub async fn collect_all(&self) -> Vec<PriceRecord> {
        let mut prices = Vec::new();

        for group in Group::RECONCILE_ORDER {
            let _guard = self.lock(group).lock_owned().await;
            let collection = collect(&self.collector, &self.plans, group).await;
            prices.extend(collection.prices);
        }

        prices
    }

    /// 上次收集時間不存在、無法解析或已超過週期的群組，依序立即收集
    pub async fn catch_up(&self) {
        let now = datetime::now_ms();

        for group in Group::RECONCILE_ORDER {
            if !is_due(self.collector.store().as_ref(), group, now).await {
                logging::info_file_async(format!("{} is up to date, skip the catch-up", group));
                continue;
            }

            logging::info_file_async(format!("{} is overdue, collect it now", group));
            let _guard = self.lock(group).lock_owned().await;
            collect(&self.collector, &self.plans, group).await;
        }
    }

    fn lock(&self, group: Group) -> Arc<Mutex<()>> {
        self.busy
            .get(&group)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(())))
    }

    fn create_job(&self, group: Group) -> Result<Job> {
        let collector = self.collector.clone();
        let plans = self.plans.clone();
        let lock = self.lock(group);

        Ok(Job::new_async_tz(group.cron(), self.tz, move |_uuid, _l| {
            let collector = collector.clone();
            let plans = plans.clone();
            let lock = lock.clone();
            Box::pin(async move {
                tick(collector, plans, lock, group).await;
            })
        })?)
    }
}

/// 時鐘觸發的收集，前一次還沒結束就略過這次
async fn tick(collector: Arc<Collector>, plans: Arc<Plans>, lock: Arc<Mutex<()>>, group: Group) {
    let _guard = match lock.try_lock_owned() {
        Ok(guard) => guard,
        Err(_) => {
            logging::warn_file_async(format!("{} is still collecting, skip this tick", group));
            return;
        }
    };

    collect(&collector, &plans, group).await;
}

async fn collect(collector: &Collector, plans: &Plans, group: Group) -> Collection {
    let fetchers = plans.get(&group).map(Vec::as_slice).unwrap_or(&[]);
    collector.run(group, fetchers).await
}

/// 讀取失敗也視為逾期，寧可多收一次
async fn is_due(store: &dyn Store, group: Group, now: i64) -> bool {
    let interval = group.interval().as_millis() as i64;

    match store.get_setting(&group.setting_key()).await {
        Ok(Some(value)) => match value.trim().trim_matches('"').parse::<i64>() {
            Ok(last) => now - last >= interval,
            Err(why) => {
                logging::warn_file_async(format!(
                    "{} has an unreadable timestamp({}) because {:?}",
                    group.setting_key(),
                    value,
                    why
                ));
                true
            }
        },
        Ok(None) => true,
        Err(why) => {
            logging::error_file_async(format!(
                "Failed to get {} because {:?}",
                group.setting_key(),
                why
            ));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        database::Database,
        event::tests::RecordingSink,
        fetcher::{
            tests::{price, Stub, StubFetcher},
            Fetcher,
        },
    };

    use super::*;

    const MINUTE_MS: i64 = 60 * 1000;

    struct Fixture {
        scheduler: Scheduler,
        store: Arc<dyn Store>,
        stubs: HashMap<Group, Arc<StubFetcher>>,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(Database::memory().await.unwrap());
        let sink = Arc::new(RecordingSink::default());
        let collector = Arc::new(Collector::new(store.clone(), sink, chrono_tz::Asia::Seoul));

        let mut stubs = HashMap::new();
        let mut plans: Plans = HashMap::new();
        for group in Group::RECONCILE_ORDER {
            let stub = StubFetcher::new(
                "stub",
                Stub::Prices(vec![price(group.as_ref(), dec!(1))]),
            );
            plans.insert(group, vec![stub.clone() as Arc<dyn Fetcher>]);
            stubs.insert(group, stub);
        }

        Fixture {
            scheduler: Scheduler::new(collector, plans, chrono_tz::Asia::Seoul),
            store,
            stubs,
        }
    }

    async fn stamp(store: &dyn Store, group: Group, at: i64) {
        store
            .set_setting(&group.setting_key(), &at.to_string())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_catch_up_only_overdue_groups() {
        let f = fixture().await;
        let now = datetime::now_ms();
        for group in Group::RECONCILE_ORDER {
            stamp(f.store.as_ref(), group, now).await;
        }
        stamp(f.store.as_ref(), Group::Crypto, now - 15 * MINUTE_MS).await;

        f.scheduler.catch_up().await;

        assert_eq!(f.stubs[&Group::Crypto].calls(), 1);
        for group in Group::RECONCILE_ORDER.iter().filter(|g| **g != Group::Crypto) {
            assert_eq!(f.stubs[group].calls(), 0, "{}", group);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_catch_up_within_interval() {
        let f = fixture().await;
        let now = datetime::now_ms();
        for group in Group::RECONCILE_ORDER {
            stamp(f.store.as_ref(), group, now - 5 * MINUTE_MS).await;
        }

        f.scheduler.catch_up().await;

        for group in Group::RECONCILE_ORDER {
            assert_eq!(f.stubs[&group].calls(), 0, "{}", group);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_or_unreadable_timestamp_is_due() {
        let f = fixture().await;
        let now = datetime::now_ms();
        f.store
            .set_setting(&Group::Oil.setting_key(), "yesterday")
            .await
            .unwrap();
        stamp(f.store.as_ref(), Group::Exchange, now).await;

        assert!(is_due(f.store.as_ref(), Group::Oil, now).await);
        assert!(is_due(f.store.as_ref(), Group::Economic, now).await);
        assert!(!is_due(f.store.as_ref(), Group::Exchange, now).await);

        f.store
            .set_setting(&Group::Trends.setting_key(), &format!("\"{}\"", now))
            .await
            .unwrap();
        assert!(!is_due(f.store.as_ref(), Group::Trends, now).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_collect_all_in_reconcile_order() {
        let f = fixture().await;

        let prices = f.scheduler.collect_all().await;
        let symbols: Vec<&str> = prices.iter().map(|p| p.symbol.as_str()).collect();

        assert_eq!(
            symbols,
            vec!["exchange", "metals", "crypto", "oil", "trends", "economic"]
        );
        for group in Group::RECONCILE_ORDER {
            assert!(f.store.get_setting(&group.setting_key()).await.unwrap().is_some());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tick_skips_busy_group() {
        let f = fixture().await;
        let lock = f.scheduler.lock(Group::Crypto);

        let held = lock.clone().lock_owned().await;
        tick(
            f.scheduler.collector.clone(),
            f.scheduler.plans.clone(),
            lock.clone(),
            Group::Crypto,
        )
        .await;
        assert_eq!(f.stubs[&Group::Crypto].calls(), 0);

        drop(held);
        tick(
            f.scheduler.collector.clone(),
            f.scheduler.plans.clone(),
            lock,
            Group::Crypto,
        )
        .await;
        assert_eq!(f.stubs[&Group::Crypto].calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_catches_up_before_arming() {
        let f = fixture().await;
        let now = datetime::now_ms();
        for group in Group::RECONCILE_ORDER {
            stamp(f.store.as_ref(), group, now).await;
        }
        stamp(f.store.as_ref(), Group::Crypto, now - 15 * MINUTE_MS).await;

        f.scheduler.start().await.unwrap();

        assert_eq!(f.stubs[&Group::Crypto].calls(), 1);
        for group in Group::RECONCILE_ORDER.iter().filter(|g| **g != Group::Crypto) {
            assert_eq!(f.stubs[group].calls(), 0, "{}", group);
        }
        assert_eq!(
            f.scheduler.armed.lock().await.as_ref().map(|a| a.jobs.len()),
            Some(6)
        );

        f.scheduler.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_and_stop() {
        let f = fixture().await;
        let now = datetime::now_ms();
        for group in Group::RECONCILE_ORDER {
            stamp(f.store.as_ref(), group, now).await;
        }

        f.scheduler.start().await.unwrap();
        assert_eq!(
            f.scheduler.armed.lock().await.as_ref().map(|a| a.jobs.len()),
            Some(6)
        );

        // 重複 start 不再補收集
        stamp(f.store.as_ref(), Group::Oil, now - 8 * 24 * 60 * MINUTE_MS).await;
        f.scheduler.start().await.unwrap();
        assert_eq!(f.stubs[&Group::Oil].calls(), 0);

        f.scheduler.stop().await;
        assert!(f.scheduler.armed.lock().await.is_none());

        // stop 之後再 start 不會補收集，也不會重新排入
        f.scheduler.start().await.unwrap();
        assert_eq!(f.stubs[&Group::Oil].calls(), 0);
        assert!(f.scheduler.armed.lock().await.is_none());
    }
}
