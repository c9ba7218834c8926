/// Logger setup: env_logger filtering, written to stderr and optionally
/// mirrored into ~/.config/kanbanai/logs/client.log.
use env_logger::Logger;
use log::{Log, Metadata, Record, SetLoggerError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config;

struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    fn new(path: PathBuf) -> Self {
        let file = Self::open(&path).ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn append_line(&self, line: &str) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_none() {
            match Self::open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(_) => return,
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.write_all(b"\n");
            let _ = file.flush();
        }
    }
}

fn format_line(record: &Record<'_>) -> String {
    let timestamp_ms = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    format!(
        "{} [{}] [{}] {}",
        timestamp_ms,
        record.level(),
        record.target(),
        record.args().to_string().replace('\n', "\\n")
    )
}

struct MirrorLogger {
    inner: Logger,
    file: Option<LogFile>,
}

impl Log for MirrorLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);
        if let Some(file) = &self.file {
            file.append_line(&format_line(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

pub fn log_file_path() -> PathBuf {
    config::config_dir().join("logs").join("client.log")
}

/// Install the global logger. `RUST_LOG` overrides the default `info` filter.
pub fn init(to_file: bool) -> Result<(), SetLoggerError> {
    let inner = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .build();
    let max_level = inner.filter();
    let logger = Box::leak(Box::new(MirrorLogger {
        inner,
        file: to_file.then(|| LogFile::new(log_file_path())),
    }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}
