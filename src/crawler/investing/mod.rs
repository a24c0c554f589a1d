use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use scraper::{Html, Selector};

use crate::util::{self, http::element, text};

const HOST: &str = "kr.investing.com";

/// 漲跌幅合理範圍，超出時視為抓到了別的百分比
const MAX_PLAUSIBLE_CHANGE: Decimal = dec!(20);

static CHANGE_IN_PARENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([+-]?\d+\.?\d*)%\)").expect("Failed to compile change regex")
});

static ANY_PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+-]?\d+\.?\d*)%").expect("Failed to compile percent regex"));

/// 取得貨幣對(例如 usd-krw)的當日漲跌幅
pub async fn visit_change(pair: &str) -> Result<Option<Decimal>> {
    let url = format!("https://{host}/currencies/{pair}", host = HOST, pair = pair);
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;

    Ok(parse_change(&html))
}

/// 頁面文字中第一個 (±x.xx%)，找不到時退而取第一個 |x| < 20 的百分比
pub fn parse_change(html: &str) -> Option<Decimal> {
    let document = Html::parse_document(html);
    let body = body_text(&document);

    if let Some(change) = text::capture_decimal(&CHANGE_IN_PARENS, &body) {
        return Some(change);
    }

    text::capture_decimal(&ANY_PERCENT, &body).filter(|c| c.abs() < MAX_PLAUSIBLE_CHANGE)
}

/// 美國聯準會利率決議的實際值
pub async fn visit_us_rate() -> Result<Decimal> {
    let url = format!(
        "https://{host}/economic-calendar/interest-rate-decision-168",
        host = HOST
    );
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;

    parse_us_rate(&html).ok_or_else(|| anyhow!("can't find the US rate from {}", url))
}

pub fn parse_us_rate(html: &str) -> Option<Decimal> {
    let document = Html::parse_document(html);
    let raw = element::select_text(&document, ".ecEventActualValue, .arial_14")?;
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    text::parse_decimal(&digits, None)
        .ok()
        .filter(|r| *r > Decimal::ZERO)
}

fn body_text(document: &Html) -> String {
    match Selector::parse("body") {
        Ok(selector) => document
            .select(&selector)
            .next()
            .map(|b| b.text().collect::<String>())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}
