use std::{fmt, thread};

use chrono::{format::DelayedFormat, DateTime, Local};
use concat_string::concat_string;
use once_cell::sync::Lazy;
use tokio::sync::mpsc::{self, UnboundedSender};

use self::rotate::Rotate;

pub mod rotate;

/// 批次寫入的緩衝大小
const BATCH_SIZE: usize = 4096;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "Debug",
            Level::Info => "Info",
            Level::Warn => "Warn",
            Level::Error => "Error",
        };
        f.write_str(s)
    }
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }

    fn line(&self) -> String {
        concat_string!(
            self.created_at.format("%F %X%.6f").to_string(),
            " ",
            self.level.to_string(),
            " ",
            self.msg,
            "\r\n"
        )
    }
}

/// 具名的檔案日誌，寫檔由獨立的執行緒處理，呼叫端不會被磁碟 I/O 阻塞
pub struct Logger {
    writer: UnboundedSender<LogMessage>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();
        let pattern = format!("log/%Y-%m-%d-{}.log", log_name);

        //寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut rotate = Rotate::new(pattern);
            let mut together = String::with_capacity(BATCH_SIZE);
            let mut last = Local::now();

            while let Some(received) = rx.blocking_recv() {
                last = received.created_at;
                together.push_str(&received.line());

                if rx.is_empty() || together.len() >= BATCH_SIZE {
                    if let Err(why) = rotate.write_msg(last, together.as_bytes()) {
                        error_console(format!("Failed to write log because {:?}", why));
                        info_console(together.clone());
                    }
                    rotate.flush();
                    together.clear();
                }
            }

            if !together.is_empty() && rotate.write_msg(last, together.as_bytes()).is_err() {
                info_console(together);
            }
        });

        Logger { writer: tx }
    }

    pub fn debug(&self, log: String) {
        self.send(Level::Debug, log);
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    fn send(&self, level: Level, msg: String) {
        if let Err(why) = self.writer.send(LogMessage::new(level, msg)) {
            error_console(why.to_string());
        }
    }
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    println!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let msg = LogMessage::new(Level::Warn, "metals partial".to_string());
        let line = msg.line();
        assert!(line.ends_with(" Warn metals partial\r\n"), "{}", line);
    }
}
