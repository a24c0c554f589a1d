use scraper::{ElementRef, Html, Selector};

/// 取出第一個符合 css_selector 的元素文字，選擇器無效或找不到時回傳 None
pub fn select_text(document: &Html, css_selector: &str) -> Option<String> {
    let selector = Selector::parse(css_selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 取出所有符合 css_selector 的元素文字
pub fn select_all_text(document: &Html, css_selector: &str) -> Vec<String> {
    match Selector::parse(css_selector) {
        Ok(selector) => document.select(&selector).map(element_text).collect(),
        Err(_) => Vec::new(),
    }
}

/// 取出 meta 標籤的 content
pub fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{}"]"#, name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(str::to_string)
}

/// 元素底下所有文字，收斂空白
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<html><head>
        <meta name="description" content="Gold rose to 2,650.10 USD/t.oz">
        </head><body>
        <div id="p"> 2650.10 </div>
        <ul><li>first <b>one</b></li><li>second</li></ul>
        </body></html>"#;

    #[test]
    fn test_select() {
        let document = Html::parse_document(HTML);
        assert_eq!(select_text(&document, "#p").as_deref(), Some("2650.10"));
        assert_eq!(select_text(&document, "#missing"), None);
        assert_eq!(select_text(&document, "[[bad"), None);
        assert_eq!(
            select_all_text(&document, "li"),
            vec!["first one".to_string(), "second".to_string()]
        );
        assert_eq!(
            meta_content(&document, "description").as_deref(),
            Some("Gold rose to 2,650.10 USD/t.oz")
        );
    }
}
