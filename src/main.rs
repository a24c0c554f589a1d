use std::{env, sync::Arc, time::Duration};

use anyhow::Result;

use crate::{
    api::AppState,
    bot::telegram::TelegramSink,
    collector::Collector,
    config::SETTINGS,
    database::Database,
    event::{ChannelSink, Fanout, Sink},
    scheduler::Scheduler,
    store::Store,
};

pub mod api;
pub mod bot;
pub mod calculation;
pub mod collector;
pub mod config;
pub mod crawler;
pub mod database;
pub mod declare;
pub mod event;
pub mod fetcher;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod util;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    // reqwest 使用 rustls-no-provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let tz = SETTINGS.system.tz();
    let database = Database::open(&SETTINGS.database.path).await?;
    let store: Arc<dyn Store> = Arc::new(database.clone());

    let events = ChannelSink::default();
    let sink: Arc<dyn Sink> = Arc::new(Fanout::new(vec![
        Arc::new(events.clone()),
        Arc::new(TelegramSink::from_settings()),
    ]));

    let collector = Arc::new(Collector::new(store.clone(), sink, tz));
    let plans = fetcher::plans(
        store.clone(),
        Duration::from_millis(SETTINGS.http.courtesy_delay_ms),
    );
    let scheduler = Arc::new(Scheduler::new(collector, plans, tz));

    logging::info_file_async(format!(
        "InfoHouse collector started. Rust OS/Arch: {}/{} timezone: {}",
        env::consts::OS,
        env::consts::ARCH,
        tz
    ));

    let s = scheduler.clone();
    tokio::spawn(async move {
        if let Err(why) = s.start().await {
            logging::error_file_async(format!("Failed to start the scheduler because {:?}", why));
        }
    });

    let state = AppState {
        store,
        scheduler: scheduler.clone(),
        events,
        tz,
    };
    let served = api::serve(state, &SETTINGS.system.api_addr, async {
        if let Err(why) = tokio::signal::ctrl_c().await {
            logging::error_file_async(format!("Failed to listen for ctrl_c because {:?}", why));
        }
    })
    .await;

    scheduler.stop().await;
    database.close().await;
    logging::info_file_async("InfoHouse collector stopped".to_string());

    served
}
