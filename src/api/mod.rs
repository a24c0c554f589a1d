use std::{convert::Infallible, future::Future, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono_tz::Tz;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::{
    calculation::stats,
    database::table::trend::TrendFilter,
    event::{ChannelSink, Event},
    logging,
    scheduler::Scheduler,
    store::Store,
    util::datetime,
};

/// 走勢圖預設天數
const DEFAULT_HISTORY_DAYS: i64 = 30;
const MAX_HISTORY_DAYS: i64 = 365;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub scheduler: Arc<Scheduler>,
    pub events: ChannelSink,
    pub tz: Tz,
}

/// 所有回應的外層 `{success, data | error}`
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    })
    .into_response()
}

fn fail(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(error),
        }),
    )
        .into_response()
}

/// Store 的錯誤只記錄，回應給呼叫端簡短訊息
fn internal(what: &str, why: anyhow::Error) -> Response {
    logging::error_file_async(format!("Failed to {} because {:?}", what, why));
    fail(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to {}", what))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/prices", get(all_prices))
        .route("/prices/{symbol}", get(latest_price))
        .route("/prices/{symbol}/history", get(price_history))
        .route("/stats/{symbol}/today", get(today_stats))
        .route("/stats/{symbol}/week", get(week_stats))
        .route("/trends", get(trends))
        .route("/collect", post(collect))
        .route("/events", get(events))
        .with_state(state)
}

/// 綁定位址後開始服務，shutdown 完成時結束
pub async fn serve<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    logging::info_file_async(format!("api is listening on {}", addr));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("api server stopped unexpectedly")
}

async fn all_prices(State(state): State<AppState>) -> Response {
    match state.store.all_latest_prices().await {
        Ok(prices) => ok(prices),
        Err(why) => internal("read the latest prices", why),
    }
}

async fn latest_price(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    match state.store.latest_price(&symbol).await {
        Ok(Some(price)) => ok(price),
        Ok(None) => fail(StatusCode::NOT_FOUND, format!("no price for {}", symbol)),
        Err(why) => internal(&format!("read the price of {}", symbol), why),
    }
}

#[derive(Deserialize, Debug, Default)]
struct HistoryQuery {
    days: Option<i64>,
}

async fn price_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let days = query
        .days
        .unwrap_or(DEFAULT_HISTORY_DAYS)
        .clamp(1, MAX_HISTORY_DAYS);

    match state.store.price_history(&symbol, days, state.tz).await {
        Ok(points) => ok(points),
        Err(why) => internal(&format!("read the history of {}", symbol), why),
    }
}

/// 設定時區今日 00:00 以後的價格
async fn today_stats(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let now = datetime::now_ms();
    let since = datetime::start_of_day_ms(now, state.tz).unwrap_or_else(|| datetime::days_ago_ms(now, 1));

    match state.store.prices_since(&symbol, since).await {
        Ok(records) => {
            let prices: Vec<_> = records.iter().map(|r| r.price).collect();
            ok(stats::today(&prices))
        }
        Err(why) => internal(&format!("read today's prices of {}", symbol), why),
    }
}

/// 近 7 天，漲跌幅以最新一筆對照期間第一筆
async fn week_stats(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let since = datetime::days_ago_ms(datetime::now_ms(), 7);

    let records = match state.store.prices_since(&symbol, since).await {
        Ok(records) => records,
        Err(why) => return internal(&format!("read this week's prices of {}", symbol), why),
    };

    let current = records.last().map(|r| r.price);
    let prices: Vec<_> = records.iter().map(|r| r.price).collect();
    ok(stats::week(&prices, current))
}

#[derive(Deserialize, Debug, Default)]
struct TrendQuery {
    source: Option<String>,
}

async fn trends(State(state): State<AppState>, Query(query): Query<TrendQuery>) -> Response {
    let filter = match query.source.as_deref() {
        None | Some("") => TrendFilter::All,
        Some(source) => match TrendFilter::from_str(source) {
            Ok(filter) => filter,
            Err(_) => {
                return fail(
                    StatusCode::BAD_REQUEST,
                    format!("unknown trend source: {}", source),
                )
            }
        },
    };

    match state.store.trends(filter).await {
        Ok(trends) => ok(trends),
        Err(why) => internal(&format!("read the {} trends", filter), why),
    }
}

/// 立即收集所有群組
async fn collect(State(state): State<AppState>) -> Response {
    ok(state.scheduler.collect_all().await)
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|received| {
        // 訂閱者跟不上時會收到 Lagged，略過遺失的事件
        let event = received.ok()?;
        match to_sse(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(why) => {
                logging::error_file_async(format!("Failed to serialize {} because {:?}", event.name(), why));
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &Event) -> Result<SseEvent, axum::Error> {
    let sse = SseEvent::default().event(event.name());
    match event {
        Event::Prices(prices) => sse.json_data(prices),
        Event::Trends(trends) => sse.json_data(trends),
        Event::Status(status) => sse.json_data(status),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{
        collector::Collector,
        database::{
            table::{price::PriceRecord, trend::TrendRecord},
            Database,
        },
        declare::{Category, Group, TrendSource},
        fetcher::{
            tests::{price, Stub, StubFetcher},
            Fetcher, Plans,
        },
    };

    use super::*;

    async fn state() -> AppState {
        let store: Arc<dyn Store> = Arc::new(Database::memory().await.unwrap());
        let events = ChannelSink::default();
        let collector = Arc::new(Collector::new(
            store.clone(),
            Arc::new(events.clone()),
            chrono_tz::Asia::Seoul,
        ));

        let mut plans: Plans = HashMap::new();
        plans.insert(
            Group::Crypto,
            vec![StubFetcher::new(
                "crypto",
                Stub::Prices(vec![price("BTC", dec!(143250000)), price("ETH", dec!(5120000))]),
            ) as Arc<dyn Fetcher>],
        );
        plans.insert(
            Group::Metals,
            vec![StubFetcher::new("gold", Stub::Fail("timeout")) as Arc<dyn Fetcher>],
        );

        AppState {
            store,
            scheduler: Arc::new(Scheduler::new(collector, plans, chrono_tz::Asia::Seoul)),
            events,
            tz: chrono_tz::Asia::Seoul,
        }
    }

    async fn call(state: &AppState, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_prices() {
        let state = state().await;
        for record in [
            PriceRecord::new(Category::Gold, "XAU", dec!(454000), "KRW").collected_at(1_000),
            PriceRecord::new(Category::Gold, "XAU", dec!(454531), "KRW").collected_at(2_000),
            PriceRecord::new(Category::Exchange, "USD", dec!(1450), "KRW").collected_at(1_500),
        ] {
            state.store.insert_price(&record).await.unwrap();
        }

        let (status, body) = call(&state, Method::GET, "/prices").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, body) = call(&state, Method::GET, "/prices/XAU").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price"].as_f64(), Some(454531.0));
        assert_eq!(body["data"]["collectedAt"], 2_000);

        let (status, body) = call(&state, Method::GET, "/prices/XAG").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("XAG"));
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let state = state().await;
        for p in [dec!(100), dec!(103), dec!(101)] {
            state
                .store
                .insert_price(&PriceRecord::new(Category::Crypto, "BTC", p, "KRW"))
                .await
                .unwrap();
        }

        let (status, body) = call(&state, Method::GET, "/prices/BTC/history?days=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (_, body) = call(&state, Method::GET, "/stats/BTC/today").await;
        assert_eq!(body["data"]["high"].as_f64(), Some(103.0));
        assert_eq!(body["data"]["low"].as_f64(), Some(100.0));
        assert_eq!(body["data"]["count"], 3);

        let (_, body) = call(&state, Method::GET, "/stats/BTC/week").await;
        assert_eq!(body["data"]["change"].as_f64(), Some(1.0));

        let (status, body) = call(&state, Method::GET, "/stats/ETH/today").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_trends() {
        let state = state().await;
        state
            .store
            .insert_trends(&[
                TrendRecord::new(TrendSource::Zum, "날씨", 1),
                TrendRecord::new(TrendSource::GoogleKr, "환율", 1),
            ])
            .await
            .unwrap();

        let (_, body) = call(&state, Method::GET, "/trends").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (_, body) = call(&state, Method::GET, "/trends?source=zum").await;
        assert_eq!(body["data"][0]["keyword"], "날씨");
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = call(&state, Method::GET, "/trends?source=naver").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_collect_publishes_events() {
        let state = state().await;
        let mut rx = state.events.subscribe();

        let (status, body) = call(&state, Method::POST, "/collect").await;
        assert_eq!(status, StatusCode::OK);
        let symbols: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|p| p["symbol"].as_str())
            .collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert!(names.contains(&"price:update"));
        assert_eq!(names.iter().filter(|n| **n == "collect:status").count(), 6);
    }

    #[test]
    fn test_to_sse() {
        assert!(to_sse(&Event::Trends(vec![])).is_ok());
    }
}
