use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::util::{self, http::element};

const HOST: &str = "zum.com";

/// 最多取前 10 名
const TOP: usize = 10;

static LEADING_RANK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s*").expect("Failed to compile leading rank regex"));

static TRAILING_DELTA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\d+$").expect("Failed to compile trailing delta regex"));

/// 取得首頁的即時搜尋關鍵字
pub async fn visit() -> Result<Vec<String>> {
    let url = format!("https://{host}/", host = HOST);
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;
    let keywords = parse(&html);
    if keywords.is_empty() {
        return Err(anyhow!("no keyword found in {}", url));
    }

    Ok(keywords)
}

/// class 含 keyword 或 rank 的元素底下的連結文字，去掉前面的名次與後面的變動數字
pub fn parse(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(r#"[class*="keyword"] a, [class*="rank"] a"#) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut keywords: Vec<String> = Vec::with_capacity(TOP);
    for anchor in document.select(&selector) {
        let keyword = clean(&element::element_text(anchor));
        let len = keyword.chars().count();
        if len > 1 && len < 30 && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }

    keywords.truncate(TOP);
    keywords
}

fn clean(text: &str) -> String {
    let text = LEADING_RANK.replace(text.trim(), "");
    TRAILING_DELTA.replace(&text, "").trim().to_string()
}
