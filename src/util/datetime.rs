use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// 目前時間的 epoch 毫秒
pub fn now_ms() -> i64 {
    Local::now().timestamp_millis()
}

/// epoch 毫秒轉成指定時區的時間，超出範圍時回傳 None
pub fn from_ms(ms: i64, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&tz))
}

/// epoch 毫秒在指定時區的日期
pub fn local_date(ms: i64, tz: Tz) -> Option<NaiveDate> {
    from_ms(ms, tz).map(|dt| dt.date_naive())
}

/// 指定時區當日 00:00 的 epoch 毫秒
pub fn start_of_day_ms(ms: i64, tz: Tz) -> Option<i64> {
    let date = local_date(ms, tz)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// 往前推 days 天的 epoch 毫秒
pub fn days_ago_ms(ms: i64, days: i64) -> i64 {
    ms - Duration::days(days).num_milliseconds()
}
