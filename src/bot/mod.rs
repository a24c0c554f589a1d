/// 收集異常時通知 Telegram 聊天室
pub mod telegram;
