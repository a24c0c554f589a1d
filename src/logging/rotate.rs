use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;

use crate::logging;

/// 單檔上限 10 MB
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
/// 保留 7 天
const KEEP_DAYS: u64 = 7;

/// 依日期切檔，單日超過大小上限時再以序號切出下一個檔案
///
/// `log/2026-10-19-default.log`、`log/2026-10-19-default.1.log` ...
pub struct Rotate {
    pattern: String,
    day_fn: String,
    seq: u32,
    written: u64,
    max_bytes: u64,
    keep: Duration,
    out: Option<BufWriter<File>>,
}

impl Rotate {
    pub fn new(pattern: String) -> Self {
        Self::with_limits(pattern, MAX_FILE_BYTES, KEEP_DAYS)
    }

    pub fn with_limits(pattern: String, max_bytes: u64, keep_days: u64) -> Self {
        Rotate {
            pattern,
            day_fn: String::new(),
            seq: 0,
            written: 0,
            max_bytes,
            keep: Duration::from_secs(keep_days * 24 * 60 * 60),
            out: None,
        }
    }

    /// 寫入一批日誌，必要時換日或換序號
    pub fn write_msg(&mut self, now: DateTime<Local>, msg: &[u8]) -> Result<()> {
        let day_fn = now.format(&self.pattern).to_string();
        if day_fn != self.day_fn || self.out.is_none() {
            self.day_fn = day_fn;
            self.seq = 0;
            self.open()?;
            self.purge();
        }

        if self.written > 0 && self.written + msg.len() as u64 > self.max_bytes {
            self.seq += 1;
            self.open()?;
        }

        let out = self
            .out
            .as_mut()
            .ok_or_else(|| anyhow!("log file {} is not open", self.day_fn))?;
        out.write_all(msg)?;
        self.written += msg.len() as u64;

        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
    }

    /// 目前序號對應的檔名
    fn file_name(&self) -> String {
        Self::numbered(&self.day_fn, self.seq)
    }

    fn numbered(day_fn: &str, seq: u32) -> String {
        if seq == 0 {
            return day_fn.to_string();
        }

        let path = Path::new(day_fn);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("log");
        path.with_file_name(format!("{}.{}.{}", stem, seq, ext))
            .to_string_lossy()
            .to_string()
    }

    fn open(&mut self) -> Result<()> {
        self.flush();

        let file_name = self.file_name();
        if let Some(dir) = Path::new(&file_name).parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_name)?;
        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out = Some(BufWriter::with_capacity(4096, file));

        Ok(())
    }

    /// 刪除超過保留期限的舊檔
    fn purge(&self) {
        let dir = match Path::new(&self.day_fn).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(why) => {
                logging::error_console(format!("Failed to read_dir({}) because {:?}", dir.display(), why));
                return;
            }
        };

        let cut_off = match SystemTime::now().checked_sub(self.keep) {
            Some(t) => t,
            None => return,
        };

        let expired: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
            .filter(|path| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map(|modified| modified < cut_off)
                    .unwrap_or(false)
            })
            .collect();

        expired
            .par_iter()
            .with_min_len(num_cpus::get())
            .for_each(|path| {
                if let Err(why) = fs::remove_file(path) {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        path.display(),
                        why
                    ));
                }
            });
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}
