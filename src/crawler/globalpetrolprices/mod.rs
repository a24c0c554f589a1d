use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::{
    crawler::Quote,
    util::{self, http::element, text::capture_decimal},
};

const HOST: &str = "www.globalpetrolprices.com";

static CURRENT_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Current\s*price\s*([\d,]+\.?\d*)").expect("Failed to compile price regex")
});

static MONTH_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)One\s*month\s*ago[\s\S]*?([\d.]+)\s*%").expect("Failed to compile change regex")
});

static TITLE_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)KRW\s*([\d,]+\.?\d*)").expect("Failed to compile title regex")
});

/// 取得南韓油價，kind 為網址上的油品名稱(gasoline、diesel)
pub async fn visit(kind: &str) -> Result<Quote> {
    let url = format!(
        "https://{host}/South-Korea/{kind}_prices/",
        host = HOST,
        kind = kind
    );
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;

    parse(&html).ok_or_else(|| anyhow!("can't find the {} price from {}", kind, url))
}

/// 從表格找 Current price 與一個月前的漲跌幅，找不到價格時改用 title
pub fn parse(html: &str) -> Option<Quote> {
    let document = Html::parse_document(html);
    let mut price = None;
    let mut change = None;

    if let Ok(selector) = Selector::parse("table") {
        for table in document.select(&selector) {
            let table_text = element::element_text(table);
            if let Some(p) = capture_decimal(&CURRENT_PRICE, &table_text) {
                price = Some(p);
            }
            if let Some(c) = capture_decimal(&MONTH_CHANGE, &table_text) {
                change = Some(c);
            }
        }
    }

    if price.is_none() {
        price = element::select_text(&document, "title")
            .and_then(|title| capture_decimal(&TITLE_PRICE, &title));
    }

    price
        .filter(|p| !p.is_zero())
        .map(|price| Quote { price, change })
}
