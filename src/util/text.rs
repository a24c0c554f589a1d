use std::str::FromStr;

use anyhow::{anyhow, Result};
use regex::Regex;
use rust_decimal::Decimal;

const NUMBER_ESCAPE_CHAR: &[char] = &[',', '+', ' ', '%', '"', '\n', '\t', '\u{a0}'];

/// 將字串轉成 Decimal，會先移除千分位逗號等字元
///
/// # Example
///
/// ```
/// let price = parse_decimal("2,650.10", None).unwrap();
/// ```
pub fn parse_decimal(s: &str, escape_chars: Option<Vec<char>>) -> Result<Decimal> {
    let cleaned = clean_escape_chars(s, escape_chars);
    Decimal::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

/// 移除數字以外的雜訊字元
pub fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut escape = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(chars) = escape_chars {
        escape.extend(chars);
    }

    s.trim().chars().filter(|c| !escape.contains(c)).collect()
}

/// 取出第一個符合 pattern 的第一個群組並轉成 Decimal
pub fn capture_decimal(re: &Regex, haystack: &str) -> Option<Decimal> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_decimal(m.as_str(), None).ok())
}

/// 將連續空白收斂成一個空白
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
