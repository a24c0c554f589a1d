/// 金屬、匯率換算
pub mod conversion;
/// 當日、一週價格統計
pub mod stats;
