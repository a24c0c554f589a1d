use std::{collections::HashMap, env, path::PathBuf, str::FromStr};

use anyhow::Result;
use chrono_tz::Tz;
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::logging;

const CONFIG_PATH: &str = "app.json";

const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Seoul;

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub system: System,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub bot: Bot,
}

const DATABASE_PATH: &str = "DATABASE_PATH";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Database {
    /// SQLite 檔案路徑
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "data/infohouse.db".to_string()
}

const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
const HTTP_CONNECT_TIMEOUT_SECS: &str = "HTTP_CONNECT_TIMEOUT_SECS";
const HTTP_COURTESY_DELAY_MS: &str = "HTTP_COURTESY_DELAY_MS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Http {
    /// 單一請求的逾時秒數
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 對同一網站連續請求之間的間隔，避免被目標網站封禁
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_courtesy_delay_ms() -> u64 {
    500
}

const SYSTEM_TIMEZONE: &str = "SYSTEM_TIMEZONE";
const SYSTEM_API_ADDR: &str = "SYSTEM_API_ADDR";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct System {
    /// 排程對齊時鐘所用的時區
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// 本機 API 的監聽位址
    #[serde(default = "default_api_addr")]
    pub api_addr: String,
}

impl Default for System {
    fn default() -> Self {
        System {
            timezone: default_timezone(),
            api_addr: default_api_addr(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.name().to_string()
}

fn default_api_addr() -> String {
    "127.0.0.1:17380".to_string()
}

const COINGECKO_API_KEY: &str = "COINGECKO_API_KEY";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Api {
    #[serde(default)]
    pub coingecko_key: String,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Bot {
    #[serde(default)]
    pub telegram: Telegram,
}

const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
const TELEGRAM_ALLOWED: &str = "TELEGRAM_ALLOWED";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Telegram {
    #[serde(default)]
    pub allowed: HashMap<i64, String>,
    #[serde(default)]
    pub token: String,
}

pub static SETTINGS: Lazy<App> = Lazy::new(App::get);

impl App {
    fn get() -> Self {
        match Self::from_file() {
            Ok(Some(config)) => config.override_with_env(),
            Ok(None) => App::default().override_with_env(),
            Err(why) => {
                logging::error_file_async(format!(
                    "I can't read the config context because {:?}",
                    why
                ));
                App::default().override_with_env()
            }
        }
    }

    fn from_file() -> Result<Option<Self>> {
        let config_path = config_path();
        if !config_path.exists() {
            return Ok(None);
        }

        let config: App = config_config::builder()
            .add_source(config_file::from(config_path))
            .build()?
            .try_deserialize()?;

        Ok(Some(config))
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(path) = env::var(DATABASE_PATH) {
            self.database.path = path;
        }

        if let Ok(secs) = env::var(HTTP_TIMEOUT_SECS) {
            self.http.timeout_secs = u64::from_str(&secs).unwrap_or_else(|_| default_timeout_secs());
        }

        if let Ok(secs) = env::var(HTTP_CONNECT_TIMEOUT_SECS) {
            self.http.connect_timeout_secs =
                u64::from_str(&secs).unwrap_or_else(|_| default_connect_timeout_secs());
        }

        if let Ok(ms) = env::var(HTTP_COURTESY_DELAY_MS) {
            self.http.courtesy_delay_ms =
                u64::from_str(&ms).unwrap_or_else(|_| default_courtesy_delay_ms());
        }

        if let Ok(tz) = env::var(SYSTEM_TIMEZONE) {
            self.system.timezone = tz;
        }

        if let Ok(addr) = env::var(SYSTEM_API_ADDR) {
            self.system.api_addr = addr;
        }

        if let Ok(key) = env::var(COINGECKO_API_KEY) {
            self.api.coingecko_key = key;
        }

        if let Ok(tg_allowed) = env::var(TELEGRAM_ALLOWED) {
            match serde_json::from_str::<HashMap<i64, String>>(&tg_allowed) {
                Ok(allowed) => {
                    self.bot.telegram.allowed = allowed;
                }
                Err(why) => {
                    logging::error_file_async(format!(
                        "Failed to serde_json because: {:?} \r\n {}",
                        why, &tg_allowed
                    ));
                }
            }
        }

        if let Ok(token) = env::var(TELEGRAM_TOKEN) {
            self.bot.telegram.token = token
        }

        self
    }
}

impl System {
    /// 解析設定的時區，無法辨識時使用 Asia/Seoul
    pub fn tz(&self) -> Tz {
        match Tz::from_str(&self.timezone) {
            Ok(tz) => tz,
            Err(why) => {
                logging::error_file_async(format!(
                    "Unknown timezone({}) because {:?}, fall back to {}",
                    self.timezone,
                    why,
                    DEFAULT_TIMEZONE.name()
                ));
                DEFAULT_TIMEZONE
            }
        }
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
