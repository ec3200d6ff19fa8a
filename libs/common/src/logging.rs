//! Logging setup shared by the EW-1 binaries
//!
//! Console output always; an optional daily log file with size rotation and
//! background gzip of old files.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV: &str = "EW1_LOG_DIR";

/// Default max file size: 10MB
const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Uncompressed logs older than this many days are gzipped
const COMPRESS_AFTER_DAYS: u64 = 7;
/// Compressed logs older than this many days are deleted
const DELETE_AFTER_DAYS: u64 = 90;

fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event format: `2026-01-15 08:30:00 [INFO] message`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} ", now.format("%Y-%m-%d %H:%M:%S"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

static GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();

/// Log directory: `EW1_LOG_DIR` if set, else `configured`, else `logs`
pub fn resolve_log_dir(configured: Option<&Path>) -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| configured.map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Log file path for `service` on `date` (`YYYYMMDD`), with an optional
/// same-day rotation index
fn log_file_name(date: &str, service: &str, rotation: u32) -> String {
    if rotation == 0 {
        format!("{date}_{service}.log")
    } else {
        format!("{date}_{service}.{rotation}.log")
    }
}

/// Appends to `{YYYYMMDD}_{service}.log`, starting a new file when the date
/// changes or the current one grows past `max_file_size`
#[derive(Clone)]
struct DailyRollingWriter {
    service_name: String,
    log_dir: PathBuf,
    max_file_size: u64,
    state: Arc<Mutex<RollingState>>,
    current_size: Arc<AtomicU64>,
    rotation_count: Arc<AtomicU32>,
}

struct RollingState {
    date: String,
    file: File,
}

impl DailyRollingWriter {
    fn new(service_name: &str, log_dir: &Path, max_file_size: u64) -> std::io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let date = today();
        let file = open_append(&log_dir.join(log_file_name(&date, service_name, 0)))?;
        let initial_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            service_name: service_name.to_string(),
            log_dir: log_dir.to_path_buf(),
            max_file_size,
            state: Arc::new(Mutex::new(RollingState { date, file })),
            current_size: Arc::new(AtomicU64::new(initial_size)),
            rotation_count: Arc::new(AtomicU32::new(0)),
        })
    }

    fn roll_if_needed(&self, state: &mut RollingState, incoming: usize) -> std::io::Result<()> {
        let date = today();
        if state.date != date {
            state.file = open_append(&self.log_dir.join(log_file_name(&date, &self.service_name, 0)))?;
            state.date = date;
            self.rotation_count.store(0, Ordering::SeqCst);
            self.current_size
                .store(state.file.metadata().map(|m| m.len()).unwrap_or(0), Ordering::SeqCst);
        } else if self.current_size.load(Ordering::Relaxed) + incoming as u64 > self.max_file_size {
            let rotation = self.rotation_count.fetch_add(1, Ordering::SeqCst) + 1;
            state.file = open_append(
                &self
                    .log_dir
                    .join(log_file_name(&state.date, &self.service_name, rotation)),
            )?;
            self.current_size.store(0, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Write for DailyRollingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?;
        self.roll_if_needed(&mut state, buf.len())?;
        let written = state.file.write(buf)?;
        self.current_size.fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.state
            .lock()
            .map_err(|e| std::io::Error::other(format!("Mutex poisoned: {}", e)))?
            .file
            .flush()
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Service name, used in log file names and the default filter
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset ("info", "debug", ...)
    pub level: String,
    /// Directory for log files; `EW1_LOG_DIR` overrides it
    pub log_dir: Option<PathBuf>,
    /// Write a daily log file besides the console
    pub file: bool,
    /// JSON lines in the log file instead of the bracketed text format
    pub json: bool,
    /// Size at which the day's file is rotated
    pub max_file_size: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "ew1".to_string(),
            level: "info".to_string(),
            log_dir: None,
            file: false,
            json: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl LogConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        match std::env::var("RUST_LOG") {
            Ok(directive) if !directive.is_empty() => EnvFilter::try_new(directive),
            _ => EnvFilter::try_new(&self.level),
        }
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", self.level, e)))
    }
}

/// Install the global subscriber.
///
/// Must be called from inside a tokio runtime when `file` is enabled, since
/// the compression task is spawned on it.
pub fn init_with_config(config: &LogConfig) -> Result<()> {
    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .event_format(BracketedLevelFormat)
        .boxed();

    let mut log_dir = None;
    let file_layer = if config.file {
        let dir = resolve_log_dir(config.log_dir.as_deref());
        let writer = DailyRollingWriter::new(&config.service_name, &dir, config.max_file_size)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(writer);

        let slot = GUARD.get_or_init(|| Mutex::new(None));
        match slot.lock() {
            Ok(mut slot) => *slot = Some(guard),
            Err(poisoned) => *poisoned.into_inner() = Some(guard),
        }

        let layer = if config.json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        log_dir = Some(dir);
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    if let Some(dir) = log_dir {
        tracing::info!("Logging: {} @ {:?}", config.service_name, dir);
        start_log_compression_task(dir, config.service_name.clone());
    }

    Ok(())
}

/// Console-only logging at `level`, for short-lived tools
pub fn init(service_name: &str, level: &str) -> Result<()> {
    init_with_config(&LogConfig::new(service_name).with_level(level))
}

/// Start background log compression task
pub fn start_log_compression_task(log_dir: PathBuf, service_name: String) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(86400));
        loop {
            interval.tick().await;
            if let Err(e) = compress_old_logs(&log_dir, &service_name).await {
                tracing::error!("Log compression error for {}: {}", service_name, e);
            }
        }
    });
}

/// `{YYYYMMDD}_{service}.log` or `{YYYYMMDD}_{service}.{N}.log`
fn is_service_log(file_name: &str, service_name: &str) -> bool {
    let Some((date, rest)) = file_name.split_once('_') else {
        return false;
    };
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some(stem) = rest
        .strip_suffix(".log")
        .and_then(|r| r.strip_prefix(service_name))
    else {
        return false;
    };
    stem.is_empty()
        || stem
            .strip_prefix('.')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// A gzipped [`is_service_log`] file
fn is_service_archive(file_name: &str, service_name: &str) -> bool {
    file_name
        .strip_suffix(".gz")
        .is_some_and(|log| is_service_log(log, service_name))
}

/// Gzip this service's logs older than a week, delete archives past retention
async fn compress_old_logs(log_dir: &Path, service_name: &str) -> Result<()> {
    use std::time::{Duration, SystemTime};

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };

        let archived = is_service_archive(&file_name, service_name);
        if !archived && !is_service_log(&file_name, service_name) {
            continue;
        }

        let modified = tokio::fs::metadata(&path).await?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if !archived && age > Duration::from_secs(COMPRESS_AFTER_DAYS * 86400) {
            compress_file(&path)?;
            tokio::fs::remove_file(&path).await?;
            tracing::debug!("Compressed: {}", file_name);
        } else if archived && age > Duration::from_secs(DELETE_AFTER_DAYS * 86400) {
            tokio::fs::remove_file(&path).await?;
            tracing::debug!("Deleted: {}", file_name);
        }
    }

    Ok(())
}

/// Write `path.gz` next to `path`
fn compress_file(path: &Path) -> Result<PathBuf> {
    let buffer = fs::read(path)?;
    let output_path = PathBuf::from(format!("{}.gz", path.display()));
    let mut encoder = GzEncoder::new(File::create(&output_path)?, Compression::best());
    encoder.write_all(&buffer)?;
    encoder.finish()?;
    Ok(output_path)
}
