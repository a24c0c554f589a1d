use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Semaphore;

use crate::{config::SETTINGS, logging::Logger};

pub mod element;
pub mod user_agent;

/// 限制最多 5 個並發請求，避免被目標網站封禁。
static SEMAPHORE: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(5));

static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// 請求失敗時的最大嘗試次數
const MAX_ATTEMPTS: u32 = 2;

/// 每次請求後的間隔
const PACING: Duration = Duration::from_millis(300);

fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        // reqwest 使用 rustls-no-provider，需先安裝 provider，重複安裝的錯誤可忽略
        let _ = rustls::crypto::ring::default_provider().install_default();

        Client::builder()
            .brotli(true)
            .gzip(true)
            .zstd(true)
            .connect_timeout(Duration::from_secs(SETTINGS.http.connect_timeout_secs))
            .timeout(Duration::from_secs(SETTINGS.http.timeout_secs))
            .tcp_nodelay(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .referer(true)
            .user_agent(user_agent::gen_random_ua())
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// 模擬瀏覽器的共用 headers，抓取 HTML 頁面時使用
pub fn browser_headers() -> header::HeaderMap {
    let mut h = header::HeaderMap::new();
    h.insert(
        header::ACCEPT,
        header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    h.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    h
}

/// GET 並回傳文字內容
pub async fn get_with_headers(url: &str, headers: Option<header::HeaderMap>) -> Result<String> {
    send(Method::GET, url, headers, None::<fn(RequestBuilder) -> RequestBuilder>)
        .await?
        .text()
        .await
        .map_err(|e| anyhow!("Error parsing response text from {}: {:?}", url, e))
}

/// GET 並將 JSON 反序列化成 RES
pub async fn get_json<RES: DeserializeOwned>(
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<RES> {
    send(Method::GET, url, headers, None::<fn(RequestBuilder) -> RequestBuilder>)
        .await?
        .json::<RES>()
        .await
        .map_err(|e| anyhow!("Error parsing response JSON from {}: {:?}", url, e))
}

/// POST JSON 並將回應反序列化成 RES
pub async fn post_use_json<REQ, RES>(url: &str, req: &REQ) -> Result<RES>
where
    REQ: Serialize,
    RES: DeserializeOwned,
{
    let res_body = send(
        Method::POST,
        url,
        None,
        Some(|rb: RequestBuilder| rb.json(req)),
    )
    .await?
    .text()
    .await
    .map_err(|e| anyhow!("Error reading response body: {}", e))?;

    serde_json::from_str(&res_body)
        .map_err(|e| anyhow!("Error parsing response JSON({}): {:?}", &res_body, e))
}

/// 送出請求，傳輸層錯誤時以指數退避重試，非 2xx 視為錯誤
async fn send(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    body: Option<impl FnOnce(RequestBuilder) -> RequestBuilder>,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let mut rb = client.request(method, url);
    let mut last_error = String::new();

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    if let Some(body_fn) = body {
        rb = body_fn(rb);
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let rb_clone = rb
            .try_clone()
            .ok_or_else(|| anyhow!("Failed to clone RequestBuilder"))?;
        let permit = SEMAPHORE.acquire().await;
        let start = Instant::now();
        let res = rb_clone.send().await;
        let elapsed = start.elapsed().as_millis();

        tokio::time::sleep(PACING).await;
        drop(permit);

        match res {
            Ok(response) => {
                let status = response.status();
                LOGGER.info(format!(
                    "Attempt {} to send {} {} {} ms",
                    attempt, visit_log, status, elapsed
                ));
                if !status.is_success() {
                    return Err(anyhow!("{} responded with {}", visit_log, status));
                }
                return Ok(response);
            }
            Err(why) => {
                last_error = format!("{:?}", why);
                LOGGER.error(format!(
                    "Attempt {} to send {} failed because {:?}. {} ms",
                    attempt, visit_log, why, elapsed
                ));
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    Err(anyhow!(
        "Failed to send request to {} after {} attempts; last error: {}",
        url,
        MAX_ATTEMPTS,
        last_error
    ))
}
