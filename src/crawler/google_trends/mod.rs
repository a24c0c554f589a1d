use anyhow::{anyhow, Result};
use scraper::Html;

use crate::util::{self, http::element, text};

/// 韓國使用 .co.kr 網域
fn host(geo: &str) -> &'static str {
    if geo.eq_ignore_ascii_case("KR") {
        "trends.google.co.kr"
    } else {
        "trends.google.com"
    }
}

/// 取得指定地區的每日熱門搜尋，依 RSS 中的順序
pub async fn visit(geo: &str) -> Result<Vec<String>> {
    let url = format!(
        "https://{host}/trending/rss?geo={geo}",
        host = host(geo),
        geo = urlencoding::encode(geo)
    );
    let rss = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;
    let keywords = parse(&rss);
    if keywords.is_empty() {
        return Err(anyhow!("no trending item in {}", url));
    }

    Ok(keywords)
}

/// 取出每個 item 的 title
pub fn parse(rss: &str) -> Vec<String> {
    let document = Html::parse_document(rss);
    element::select_all_text(&document, "item title")
        .into_iter()
        .map(|t| text::collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
        .collect()
}
