use std::{thread, time::Duration};

use chrono::{format::DelayedFormat, DateTime, Local};
use concat_string::concat_string;
use crossbeam_channel::{bounded, unbounded, Sender};
use once_cell::sync::Lazy;

use crate::logging::rotate::Rotate;

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new(env!("CARGO_PKG_NAME")));

/// 日誌的目錄
const LOG_DIR: &str = "log";
/// 累積到這個長度才寫入檔案
const FLUSH_SIZE: usize = 4096;

pub struct Logger {
    writer: Sender<Command>,
}

/// 送往寫檔線程的指令
enum Command {
    Write(LogMessage),
    /// 把累積的內容寫入檔案後回覆
    Flush(Sender<()>),
}

impl Logger {
    /// 建立一個寫入 `log/%Y-%m-%d-{log_name}.log` 的日誌
    pub fn new(log_name: &str) -> Self {
        Self::with_pattern(format!("{}/%Y-%m-%d-{}.log", LOG_DIR, log_name))
    }

    /// 以 chrono 格式的檔名樣式建立日誌
    pub fn with_pattern(fn_pattern: String) -> Self {
        let (tx, rx) = unbounded::<Command>();
        let mut rotate = Rotate::new(fn_pattern);

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut together = String::with_capacity(FLUSH_SIZE);
            let mut last_at = Local::now();

            let mut write = |together: &mut String, at: DateTime<Local>| {
                if together.is_empty() {
                    return;
                }

                if let Err(why) = rotate.write_msg(at, together.as_bytes()) {
                    error_console(format!(
                        "Failed to write to log file. because:{:?}\r\nmsg:{}",
                        why, together
                    ));
                }

                rotate.flush();
                together.clear();
            };

            while let Ok(command) = rx.recv() {
                match command {
                    Command::Write(received) => {
                        together.push_str(&received.to_line());
                        last_at = received.created_at;

                        if rx.is_empty() || together.len() >= FLUSH_SIZE {
                            write(&mut together, last_at);
                        }
                    }
                    Command::Flush(done) => {
                        write(&mut together, last_at);
                        let _ = done.send(());
                    }
                }
            }
        });

        Logger { writer: tx }
    }

    pub fn info(&self, log: String) {
        self.send(log::Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(log::Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(log::Level::Error, log);
    }

    pub fn debug(&self, log: String) {
        self.send(log::Level::Debug, log);
    }

    /// 等待已送出的日誌寫入檔案，最多等待 `timeout`，成功時回傳 true
    pub fn flush(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = bounded(1);
        if self.writer.send(Command::Flush(done_tx)).is_err() {
            return false;
        }

        done_rx.recv_timeout(timeout).is_ok()
    }

    fn send(&self, level: log::Level, msg: String) {
        if let Err(why) = self.writer.send(Command::Write(LogMessage::new(level, msg))) {
            error_console(why.to_string());
        }
    }
}

pub struct LogMessage {
    pub level: log::Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: log::Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }

    fn to_line(&self) -> String {
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

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

/// 程式結束前呼叫，避免佇列中的日誌遺失
pub fn flush(timeout: Duration) {
    if !LOGGER.flush(timeout) {
        error_console("Timed out flushing log file".to_string());
    }
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
