//! Per-session log file.
//!
//! By default lines are buffered in memory and written out when the session
//! ends, which keeps disk I/O off the render and capture threads. With
//! streaming enabled every line goes to the file immediately and is echoed
//! to stdout through a `tracing` subscriber.

use anyhow::Result;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Info => "",
            Level::Warn => "WARN: ",
            Level::Error => "ERROR: ",
        }
    }
}

pub struct SessionLogger {
    log_buffer: Mutex<Vec<String>>,
    log_path: PathBuf,
    log_dir: PathBuf,
    app_name: String,
    streaming: bool,
}

impl SessionLogger {
    pub fn new(log_dir: PathBuf, app_name: &str, retention_count: usize, streaming: bool) -> Result<Self> {
        fs::create_dir_all(&log_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("{}_{}.log", app_name, timestamp);
        let log_path = log_dir.join(&log_filename);

        let logger = Self {
            log_buffer: Mutex::new(Vec::new()),
            log_path,
            log_dir,
            app_name: app_name.to_string(),
            streaming,
        };

        // Leave room for the file this session is about to create.
        logger.clean_old_logs(retention_count.saturating_sub(1))?;
        logger.log(Level::Info, format!("=== {} Session Started ===", app_name));

        Ok(logger)
    }

    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        let message = message.as_ref();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let log_line = format!("[{}] {}{}", timestamp, level.prefix(), message);

        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }

        if self.streaming {
            let _ = self.write_line_to_file(&log_line);
        } else {
            self.log_buffer.lock().push(log_line);
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn buffered_lines(&self) -> usize {
        self.log_buffer.lock().len()
    }

    fn write_line_to_file(&self, line: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    /// Keeps the `keep` most recent session logs of this application.
    fn clean_old_logs(&self, keep: usize) -> Result<()> {
        let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        let prefix = format!("{}_", self.app_name);

        for entry in fs::read_dir(&self.log_dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("log") {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !filename.starts_with(&prefix) {
                continue;
            }
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }

        log_files.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in log_files.iter().skip(keep) {
            let _ = fs::remove_file(path);
        }

        Ok(())
    }

    pub fn flush_to_disk(&self) -> Result<()> {
        let mut buffer = self.log_buffer.lock();
        if buffer.is_empty() {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        for line in buffer.iter() {
            writeln!(file, "{}", line)?;
        }

        file.flush()?;
        buffer.clear();
        Ok(())
    }

    pub fn finalize(&self) -> Result<()> {
        self.log(Level::Info, format!("=== {} Session Ended ===", self.app_name));
        self.flush_to_disk()
    }
}

static LOGGER: once_cell::sync::OnceCell<SessionLogger> = once_cell::sync::OnceCell::new();

pub fn init_logger(log_dir: PathBuf, app_name: &str, retention_count: usize, streaming: bool) -> Result<()> {
    if streaming {
        // Another subscriber may already be installed by an embedding binary.
        let _ = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_names(true)
            .try_init();
    }

    let logger = SessionLogger::new(log_dir, app_name, retention_count, streaming)?;
    LOGGER.set(logger).map_err(|_| anyhow::anyhow!("Logger already initialized"))?;
    Ok(())
}

pub fn log_error(message: impl AsRef<str>) {
    if let Some(logger) = LOGGER.get() {
        logger.log(Level::Error, message);
    }
}

pub fn log_warn(message: impl AsRef<str>) {
    if let Some(logger) = LOGGER.get() {
        logger.log(Level::Warn, message);
    }
}

pub fn log_info(message: impl AsRef<str>) {
    if let Some(logger) = LOGGER.get() {
        logger.log(Level::Info, message);
    }
}

pub fn finalize_logs() -> Result<()> {
    if let Some(logger) = LOGGER.get() {
        logger.finalize()?;
    }
    Ok(())
}

pub fn get_log_path() -> Option<PathBuf> {
    LOGGER.get().map(|logger| logger.log_path.clone())
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::log_info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::log_warn(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::log_error(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("display-bridge-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn buffered_lines_reach_disk_on_finalize() {
        let dir = scratch_dir("logger-buffered");
        let logger = SessionLogger::new(dir.clone(), "bridge", 10, false).unwrap();
        logger.log(Level::Warn, "device busy");
        assert!(!logger.log_path().exists());
        assert_eq!(logger.buffered_lines(), 2);

        logger.finalize().unwrap();
        let text = fs::read_to_string(logger.log_path()).unwrap();
        assert!(text.contains("Session Started"));
        assert!(text.contains("WARN: device busy"));
        assert!(text.contains("Session Ended"));
        assert_eq!(logger.buffered_lines(), 0);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn old_sessions_are_pruned() {
        let dir = scratch_dir("logger-retention");
        fs::create_dir_all(&dir).unwrap();
        for i in 0..5 {
            fs::write(dir.join(format!("bridge_2020010{}_000000.log", i)), "old").unwrap();
        }
        fs::write(dir.join("other_20200101_000000.log"), "keep").unwrap();

        let logger = SessionLogger::new(dir.clone(), "bridge", 3, true).unwrap();
        let remaining = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("bridge_"))
            .count();
        // Two old files plus this session's streamed file.
        assert_eq!(remaining, 3);
        assert!(dir.join("other_20200101_000000.log").exists());

        drop(logger);
        let _ = fs::remove_dir_all(dir);
    }
}
