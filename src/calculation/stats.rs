use rust_decimal::Decimal;
use serde::Serialize;

use crate::calculation::conversion::round_half_up;

/// 當日統計
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TodayStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg: Decimal,
    pub count: usize,
}

/// 一週統計，change 為期間第一筆到目前價格的漲跌幅(%)
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WeekStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    pub count: usize,
}

fn high_low(prices: &[Decimal]) -> Option<(Decimal, Decimal)> {
    let high = prices.iter().max()?;
    let low = prices.iter().min()?;
    Some((*high, *low))
}

pub fn today(prices: &[Decimal]) -> Option<TodayStats> {
    let (high, low) = high_low(prices)?;
    let sum: Decimal = prices.iter().sum();
    let avg = sum / Decimal::from(prices.len());

    Some(TodayStats {
        high: round_half_up(high, 2),
        low: round_half_up(low, 2),
        avg: round_half_up(avg, 2),
        count: prices.len(),
    })
}

/// prices 需依收集時間由舊到新排序
pub fn week(prices: &[Decimal], current: Option<Decimal>) -> Option<WeekStats> {
    let (high, low) = high_low(prices)?;
    let oldest = prices.first().copied().unwrap_or_default();
    let change = match current {
        Some(current) if oldest > Decimal::ZERO => {
            (current - oldest) / oldest * Decimal::ONE_HUNDRED
        }
        _ => Decimal::ZERO,
    };

    Some(WeekStats {
        high: round_half_up(high, 2),
        low: round_half_up(low, 2),
        change: round_half_up(change, 2),
        count: prices.len(),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_today() {
        let stats = today(&[dec!(100), dec!(103), dec!(101)]).unwrap();
        assert_eq!(stats.high, dec!(103));
        assert_eq!(stats.low, dec!(100));
        assert_eq!(stats.avg, dec!(101.33));
        assert_eq!(stats.count, 3);
        assert!(today(&[]).is_none());
    }

    #[test]
    fn test_week() {
        let stats = week(&[dec!(200), dec!(180), dec!(210)], Some(dec!(220))).unwrap();
        assert_eq!(stats.high, dec!(210));
        assert_eq!(stats.low, dec!(180));
        assert_eq!(stats.change, dec!(10));
        assert_eq!(stats.count, 3);

        let flat = week(&[dec!(0)], Some(dec!(5))).unwrap();
        assert_eq!(flat.change, dec!(0));
        assert!(week(&[], None).is_none());
    }
}
