//! Logging system initialization
//!
//! One `tracing` subscriber for the whole process. Output goes to stdout or
//! a (optionally daily rotated) file through a non-blocking writer; `RUST_LOG`
//! overrides the configured level when set.

use std::io::Write;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingConfig, StaticConfig};

const DEFAULT_LOG_FILE: &str = "flash-offers.log";

/// 连接池与 SQL 日志在 debug 下过于嘈杂，默认压到 warn
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "sea_orm=warn", "actix_server=info"];

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Stdout,
    File(String),
    Rolling { dir: String, prefix: String },
}

impl LogTarget {
    fn from_config(logging: &LoggingConfig) -> Self {
        let Some(file) = logging.file.as_deref().filter(|f| !f.trim().is_empty()) else {
            return LogTarget::Stdout;
        };
        if !logging.enable_rotation {
            return LogTarget::File(file.to_string());
        }

        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);
        LogTarget::Rolling {
            dir,
            prefix: name.trim_end_matches(".log").to_string(),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, LogTarget::Stdout)
    }

    /// 文件无法打开时退回 stdout，不阻止启动
    fn open(&self, max_backups: u32) -> Box<dyn Write + Send + Sync> {
        match self {
            LogTarget::Stdout => Box::new(std::io::stdout()),
            LogTarget::File(path) => {
                match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                    Ok(file) => Box::new(file),
                    Err(e) => {
                        eprintln!("Cannot open log file {}: {}, logging to stdout", path, e);
                        Box::new(std::io::stdout())
                    }
                }
            }
            LogTarget::Rolling { dir, prefix } => {
                match rolling::Builder::new()
                    .rotation(rolling::Rotation::DAILY)
                    .filename_prefix(prefix)
                    .filename_suffix("log")
                    .max_log_files(max_backups.max(1) as usize)
                    .build(dir)
                {
                    Ok(appender) => Box::new(appender),
                    Err(e) => {
                        eprintln!("Cannot create rolling log in {}: {}, logging to stdout", dir, e);
                        Box::new(std::io::stdout())
                    }
                }
            }
        }
    }
}

fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.eq_ignore_ascii_case("trace") {
        return level.to_string();
    }
    std::iter::once(level)
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging system based on configuration
///
/// **Note**: Call once, after configuration is loaded. The returned guard
/// must outlive the program's logging or buffered lines are lost.
///
/// # Panics
/// * If a global subscriber was already installed
pub fn init_logging(config: &StaticConfig) -> WorkerGuard {
    let target = LogTarget::from_config(&config.logging);
    let (writer, guard) = tracing_appender::non_blocking(target.open(config.logging.max_backups));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(target.is_terminal());

    if config.logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }

    guard
}
