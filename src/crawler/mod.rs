use rust_decimal::Decimal;

/// CoinGecko 加密貨幣報價 API
pub mod coingecko;
/// ExchangeRate-API 以美元為基準的匯率表
pub mod exchangerate_api;
/// GlobalPetrolPrices 南韓油價
pub mod globalpetrolprices;
/// Google Trends 每日熱門搜尋 RSS
pub mod google_trends;
/// Investing.com 匯率漲跌幅、美國利率
pub mod investing;
/// 네이버 금융 韓國基準利率
pub mod naver;
/// TradingEconomics 金、銀、USD/KRW
pub mod tradingeconomics;
/// 줌 即時搜尋關鍵字
pub mod zum;

/// 單一商品的報價，change 為漲跌幅(%)，網站沒有提供時為 None
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quote {
    pub price: Decimal,
    pub change: Option<Decimal>,
}
