//! Shared logging utilities for Rentcart binaries.
//!
//! Everything goes to `<home>/logs/<app>.log`; stderr only carries warnings
//! unless the caller asks for verbose output.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const HOME_ENV: &str = "RENTCART_HOME";
const DEFAULT_LOG_FILTER: &str = "rentcart=info,rentcart_store=info";
const VERBOSE_LOG_FILTER: &str = "rentcart=debug,rentcart_store=debug";
const KEEP_ARCHIVES: usize = 3;
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Keep stderr quiet (warnings only) unless `verbose` is set.
    pub quiet_console: bool,
}

/// Install the global subscriber: size-capped log file plus stderr.
///
/// `RUST_LOG` overrides the file filter. Fails if a subscriber is already
/// installed.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir()?;
    let log_file = LogFile::open(&log_dir, config.app_name, MAX_LOG_BYTES, KEEP_ARCHIVES)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = match (config.verbose, config.quiet_console) {
        (true, _) => EnvFilter::new(VERBOSE_LOG_FILTER),
        (false, true) => EnvFilter::new("warn"),
        (false, false) => EnvFilter::new(DEFAULT_LOG_FILTER),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .without_time()
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Root for config, selections and logs: `$RENTCART_HOME`, else
/// `~/.rentcart`, else `./.rentcart`.
pub fn rentcart_home() -> PathBuf {
    match std::env::var_os(HOME_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rentcart"),
    }
}

pub fn logs_dir() -> PathBuf {
    rentcart_home().join("logs")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Append-only log file that is archived once it passes `max_bytes`.
///
/// Archives are named `<app>.<unix-millis>.log`; only the newest `keep` are
/// retained.
struct LogFile {
    dir: PathBuf,
    app: String,
    max_bytes: u64,
    keep: usize,
    file: File,
    written: u64,
}

impl LogFile {
    fn open(dir: &Path, app_name: &str, max_bytes: u64, keep: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let app = file_stem_for(app_name);
        let (file, written) = open_append(&dir.join(format!("{}.log", app)))?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            app,
            max_bytes,
            keep,
            file,
            written,
        };
        if log.written >= log.max_bytes {
            log.archive()?;
        }
        Ok(log)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.app))
    }

    /// Move the active file aside, start a fresh one, prune old archives.
    fn archive(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        // Stamps order the archives, so they must keep increasing.
        let stamp = match self.archives()?.last() {
            Some((newest, _)) if *newest >= now => newest + 1,
            _ => now,
        };
        fs::rename(self.active_path(), self.archive_path(stamp))?;

        let (file, written) = open_append(&self.active_path())?;
        self.file = file;
        self.written = written;
        self.prune()
    }

    fn archive_path(&self, stamp: u128) -> PathBuf {
        self.dir.join(format!("{}.{}.log", self.app, stamp))
    }

    fn archives(&self) -> io::Result<Vec<(u128, PathBuf)>> {
        let prefix = format!("{}.", self.app);
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let stamp = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".log"))
                .and_then(|digits| digits.parse::<u128>().ok());
            if let Some(stamp) = stamp {
                found.push((stamp, path));
            }
        }
        found.sort();
        Ok(found)
    }

    fn prune(&self) -> io::Result<()> {
        let archives = self.archives()?;
        let excess = archives.len().saturating_sub(self.keep);
        for (_, path) in archives.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.archive()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

/// Binary names become file stems; anything outside `[A-Za-z0-9_-]` is
/// replaced.
fn file_stem_for(app_name: &str) -> String {
    let stem: String = app_name
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect();
    if stem.is_empty() {
        "rentcart".to_string()
    } else {
        stem
    }
}
