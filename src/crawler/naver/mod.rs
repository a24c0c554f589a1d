use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use scraper::{Html, Selector};

use crate::util::{self, http::element, text};

const HOST: &str = "finance.naver.com";

/// 韓國銀行基準利率
pub async fn visit_korea_rate() -> Result<Decimal> {
    let url = format!("https://{host}/marketindex/interestRate.naver", host = HOST);
    let html = util::http::get_with_headers(&url, Some(util::http::browser_headers())).await?;

    parse_korea_rate(&html).ok_or_else(|| anyhow!("can't find the Korea base rate from {}", url))
}

/// 在 tbl_exchange 找名稱含 한국、기준금리 的列，找不到時取第一個 .tb_td1
pub fn parse_korea_rate(html: &str) -> Option<Decimal> {
    let document = Html::parse_document(html);
    let rows = Selector::parse("table.tbl_exchange tbody tr").ok()?;
    let name_cell = Selector::parse("td:first-child").ok()?;
    let value_cell = Selector::parse("td:nth-child(2)").ok()?;

    let from_table = document.select(&rows).find_map(|row| {
        let name = row
            .select(&name_cell)
            .next()
            .map(element::element_text)
            .unwrap_or_default();
        if !(name.contains("한국") && name.contains("기준금리")) {
            return None;
        }

        row.select(&value_cell)
            .next()
            .and_then(|v| text::parse_decimal(&element::element_text(v), None).ok())
    });

    from_table
        .or_else(|| {
            element::select_text(&document, ".tb_td1")
                .and_then(|t| text::parse_decimal(&t, None).ok())
        })
        .filter(|r| *r > Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::logging;

    use super::*;

    #[test]
    fn test_parse_table_row() {
        let html = r#"<html><body><table class="tbl_exchange"><tbody>
            <tr><td>CD(91일)</td><td>2.65</td></tr>
            <tr><td>한국 기준금리</td><td>2.50</td></tr>
            </tbody></table></body></html>"#;
        assert_eq!(parse_korea_rate(html), Some(dec!(2.50)));
    }

    #[test]
    fn test_parse_fallback() {
        let html = r#"<html><body><table><tbody><tr><td class="tb_td1">2.75</td></tr></tbody></table></body></html>"#;
        assert_eq!(parse_korea_rate(html), Some(dec!(2.75)));
        assert_eq!(parse_korea_rate("<html><body></body></html>"), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_visit_korea_rate() {
        match visit_korea_rate().await {
            Ok(rate) => logging::debug_file_async(format!("rate: {}", rate)),
            Err(why) => logging::error_file_async(format!("Failed to visit because {:?}", why)),
        }
    }
}
