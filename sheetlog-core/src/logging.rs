//! Diagnostic trace for sheetlog
//!
//! Every queued event, batch outcome, probe result and failed host read is
//! traced to `$XDG_STATE_HOME/sheetlog/sheetlog.log.<date>`, one file per UTC
//! day. Only significant transitions reach the status interface.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{Config, LoggingConfig};

/// Prefix of the daily trace files
pub const LOG_FILE_PREFIX: &str = "sheetlog.log";

/// Install the file subscriber.
///
/// The level comes from `RUST_LOG` when set, otherwise from `config.level`.
/// The client runs on a single thread, so thread ids are left out.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    let path = log_file_path();
    tracing::info!(path = %path.display(), level = %config.level, "Logging initialized");

    Ok(LoggingGuard {
        path,
        _guard: guard,
    })
}

/// Initialize logging for tests (test writer, `RUST_LOG` filter)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Keeps the non-blocking writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    path: PathBuf,
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl LoggingGuard {
    /// The file being written when logging started
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The trace file written today.
pub fn log_file_path() -> PathBuf {
    log_file_for(&Config::state_dir(), Utc::now().date_naive())
}

/// Daily rotation appends the UTC date to the prefix.
fn log_file_for(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}
