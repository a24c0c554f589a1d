use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::Html;

use crate::{
    crawler::Quote,
    util::{
        self,
        http::element,
        text::{self, capture_decimal},
    },
};

const HOST: &str = "tradingeconomics.com";

/// USD/KRW 低於此值視為解析錯誤
const MIN_USD_KRW: Decimal = Decimal::ONE_HUNDRED;

static META_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:rose|fell|increased|decreased|remained)?\s*(?:to|at)?\s*([\d,]+\.?\d*)\s*USD")
        .expect("Failed to compile meta price regex")
});

static META_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:up|down)\s+([\d.]+)%").expect("Failed to compile meta change regex")
});

/// 取得商品(gold、silver)每盎司的美元報價
pub async fn visit_commodity(name: &str) -> Result<Quote> {
    let url = format!("https://{host}/commodity/{name}", host = HOST, name = name);
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;

    parse_commodity(&html).ok_or_else(|| anyhow!("can't find the {} quote from {}", name, url))
}

/// 先從 meta description 取價格與漲跌幅，取不到再讀 #p、#pch
pub fn parse_commodity(html: &str) -> Option<Quote> {
    let document = Html::parse_document(html);

    if let Some(desc) = element::meta_content(&document, "description") {
        if let Some(price) = capture_decimal(&META_PRICE, &desc).filter(|p| *p > Decimal::ZERO) {
            let change = capture_decimal(&META_CHANGE, &desc).map(|c| {
                if desc.to_lowercase().contains("down") {
                    -c
                } else {
                    c
                }
            });
            return Some(Quote { price, change });
        }
    }

    let price = element::select_text(&document, "#p")
        .and_then(|t| first_token_decimal(&t))
        .filter(|p| *p > Decimal::ZERO)?;
    let change = element::select_text(&document, "#pch")
        .and_then(|t| text::parse_decimal(&t, None).ok());

    Some(Quote { price, change })
}

/// 即時 USD/KRW
pub async fn visit_usd_krw() -> Result<Decimal> {
    let url = format!("https://{host}/usdkrw:cur", host = HOST);
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;

    parse_usd_krw(&html).ok_or_else(|| anyhow!("can't find USD/KRW from {}", url))
}

pub fn parse_usd_krw(html: &str) -> Option<Decimal> {
    let document = Html::parse_document(html);
    element::select_text(&document, "#p")
        .and_then(|t| first_token_decimal(&t))
        .filter(|rate| *rate > MIN_USD_KRW)
}

fn first_token_decimal(s: &str) -> Option<Decimal> {
    s.split_whitespace()
        .next()
        .and_then(|t| text::parse_decimal(t, None).ok())
}
