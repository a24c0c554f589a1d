use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    collector::{CollectStatus, Status},
    config::SETTINGS,
    database::table::{price::PriceRecord, trend::TrendRecord},
    event::Sink,
    logging,
    util::http,
};

/// 只在群組收集為 partial 時發送訊息給允許的聊天室，沒有設定 token 時不做任何事
#[derive(Clone)]
pub struct TelegramSink {
    send_message_url: Option<String>,
    allowed: Vec<i64>,
}

impl TelegramSink {
    pub fn new(token: &str, allowed: Vec<i64>) -> Self {
        let send_message_url = if token.is_empty() {
            None
        } else {
            Some(format!("https://api.telegram.org/bot{}/sendMessage", token))
        };

        TelegramSink {
            send_message_url,
            allowed,
        }
    }

    pub fn from_settings() -> Self {
        Self::new(
            &SETTINGS.bot.telegram.token,
            SETTINGS.bot.telegram.allowed.keys().copied().collect(),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.send_message_url.is_some() && !self.allowed.is_empty()
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let url = match &self.send_message_url {
            Some(url) => url,
            None => return Ok(()),
        };

        let futures: Vec<_> = self
            .allowed
            .iter()
            .map(|id| send_message(url, SendMessageRequest::new(*id, message)))
            .collect();

        join_all(futures)
            .await
            .into_iter()
            .find(|res| res.is_err())
            .unwrap_or_else(|| Ok(()))
    }
}

async fn send_message(url: &str, payload: SendMessageRequest<'_>) -> Result<()> {
    let res = http::post_use_json::<SendMessageRequest, SendMessageResponse>(url, &payload)
        .await
        .map_err(|err| anyhow!("Failed to send_message because: {:?}", err))?;

    if !res.ok {
        return Err(anyhow!("telegram refused the message to {}", payload.chat_id));
    }

    Ok(())
}

/// partial 狀態的通知內容
fn format_status(status: &CollectStatus) -> String {
    let mut msg = format!(
        "[{}] {} 筆，{} 個錯誤\r\n",
        status.category,
        status.count,
        status.errors.len()
    );
    for err in &status.errors {
        msg.push_str("- ");
        msg.push_str(err);
        msg.push_str("\r\n");
    }
    msg
}

#[async_trait]
impl Sink for TelegramSink {
    async fn prices(&self, _records: &[PriceRecord]) {}

    async fn trends(&self, _records: &[TrendRecord]) {}

    async fn status(&self, status: &CollectStatus) {
        if status.status != Status::Partial || !self.is_enabled() {
            return;
        }

        let bot = self.clone();
        let msg = format_status(status);
        tokio::spawn(async move {
            if let Err(why) = bot.send(&msg).await {
                logging::error_file_async(format!("Failed to send telegram because {:?}", why));
            }
        });
    }
}

#[derive(Serialize, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    result: Option<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    message_id: i64,
}

#[derive(Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

impl<'a> SendMessageRequest<'a> {
    pub fn new(chat_id: i64, text: &'a str) -> SendMessageRequest<'a> {
        SendMessageRequest { chat_id, text }
    }
}
