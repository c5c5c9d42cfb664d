/// Daily log file output
///
/// Lines are appended to `logs/volumebot_<YYYY-MM-DD>.log`. Writes before
/// `init_file_logging` or after a failed open are dropped silently.
use crate::paths;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

struct FileLogger {
    writer: BufWriter<File>,
    date: String,
}

static FILE_LOGGER: Lazy<Mutex<Option<FileLogger>>> = Lazy::new(|| Mutex::new(None));

fn open_for_date(date: &str) -> Option<FileLogger> {
    let dir = paths::get_logs_directory();
    if std::fs::create_dir_all(&dir).is_err() {
        return None;
    }
    let path = dir.join(format!("volumebot_{}.log", date));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
        .map(|file| FileLogger {
            writer: BufWriter::new(file),
            date: date.to_string(),
        })
}

pub fn init_file_logging() {
    let date = Local::now().format("%Y-%m-%d").to_string();
    match open_for_date(&date) {
        Some(logger) => *FILE_LOGGER.lock() = Some(logger),
        None => eprintln!(
            "Logger: could not open log file in {}",
            paths::get_logs_directory().display()
        ),
    }
}

pub fn write_to_file(line: &str) {
    let mut guard = FILE_LOGGER.lock();
    let Some(logger) = guard.as_mut() else {
        return;
    };

    // Roll over at midnight
    let today = Local::now().format("%Y-%m-%d").to_string();
    if logger.date != today {
        let _ = logger.writer.flush();
        match open_for_date(&today) {
            Some(next) => *logger = next,
            None => return,
        }
    }

    let _ = writeln!(logger.writer, "{}", line);
}

pub fn flush_file_logging() {
    if let Some(logger) = FILE_LOGGER.lock().as_mut() {
        let _ = logger.writer.flush();
    }
}
