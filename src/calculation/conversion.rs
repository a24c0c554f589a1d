use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// 1 金衡盎司的公克數
pub const GRAMS_PER_TROY_OUNCE: Decimal = dec!(31.1035);
/// 1 돈的公克數
pub const GRAMS_PER_DON: Decimal = dec!(3.75);

/// 四捨五入到 dp 位，.5 一律遠離零
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// 每盎司美元價格換算成每돈韓圜價格，取整數
pub fn ounce_to_don(usd_per_ounce: Decimal, usd_krw: Decimal) -> Decimal {
    round_half_up(
        usd_per_ounce * usd_krw * GRAMS_PER_DON / GRAMS_PER_TROY_OUNCE,
        0,
    )
}

/// 以美元為基準的匯率表推算其他貨幣對韓圜的匯率
///
/// `units_per_usd` 是 1 美元可換得的外幣數量，`per` 為報價單位（日圓、越南盾以 100 為單位）。
/// `units_per_usd` 為 0 時無法換算，回傳 None。
pub fn cross_rate(usd_krw: Decimal, units_per_usd: Decimal, per: Decimal) -> Option<Decimal> {
    if units_per_usd.is_zero() {
        return None;
    }

    usd_krw
        .checked_div(units_per_usd)
        .and_then(|v| v.checked_mul(per))
        .map(|v| round_half_up(v, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ounce_to_don() {
        // 2600 * 1450 * 3.75 / 31.1035 = 454531.48...
        assert_eq!(ounce_to_don(dec!(2600), dec!(1450)), dec!(454531));
        assert_eq!(ounce_to_don(dec!(31.1035), dec!(1)), dec!(4));
        assert_eq!(ounce_to_don(dec!(0), dec!(1450)), dec!(0));
    }

    #[test]
    fn test_cross_rate() {
        assert_eq!(cross_rate(dec!(1450), dec!(0.92), dec!(1)), Some(dec!(1576.09)));
        // 日圓以 100 為單位
        assert_eq!(cross_rate(dec!(1450), dec!(150), dec!(100)), Some(dec!(966.67)));
        assert_eq!(cross_rate(dec!(1450), dec!(0), dec!(1)), None);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(dec!(2.345), 2), dec!(2.35));
        assert_eq!(round_half_up(dec!(-2.345), 2), dec!(-2.35));
        assert_eq!(round_half_up(dec!(0.5), 0), dec!(1));
    }
}
