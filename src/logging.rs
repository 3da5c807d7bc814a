//! Diagnostic logging setup.
//!
//! One tracing subscriber feeds two destinations: compact timestamped
//! output on the terminal, and a mirror of the same events into the
//! active run's `run.log`. The orchestrator attaches the mirror with
//! [`mirror_to`] when a run starts; resolver and search diagnostics then
//! land in the artifact next to the blackboard dumps written by
//! `output::RunLogger`, using the same timestamp format as its lines.
//!
//! The `RUST_LOG` environment variable takes precedence over config.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! resolver = "debug"
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, Once, OnceLock};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// The run-log file currently receiving mirrored events. One run per
/// process owns this (runs are never concurrent).
fn run_log_slot() -> &'static Mutex<Option<File>> {
    static SLOT: OnceLock<Mutex<Option<File>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Compact terminal time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Run-log time format, matching the `RunLogger` line prefix.
struct RunLogTime;

impl FormatTime for RunLogTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Writer handle appending to the attached run log. Writes are dropped
/// when no run has attached one.
struct RunLogHandle;

impl Write for RunLogHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut slot) = run_log_slot().lock() {
            if let Some(file) = slot.as_mut() {
                file.write_all(buf)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut slot) = run_log_slot().lock() {
            if let Some(file) = slot.as_mut() {
                return file.flush();
            }
        }
        Ok(())
    }
}

struct RunLogWriter;

impl<'a> MakeWriter<'a> for RunLogWriter {
    type Writer = RunLogHandle;

    fn make_writer(&'a self) -> RunLogHandle {
        RunLogHandle
    }
}

/// Guard for an attached run-log mirror; detaches on drop.
pub struct RunLogMirror {
    active: bool,
}

impl Drop for RunLogMirror {
    fn drop(&mut self) {
        if self.active {
            if let Ok(mut slot) = run_log_slot().lock() {
                *slot = None;
            }
        }
    }
}

/// Mirror tracing events into `path` (appending) until the returned
/// guard is dropped. When the file cannot be opened the guard is inert
/// and events go to the terminal only.
pub fn mirror_to(path: &Path) -> RunLogMirror {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            if let Ok(mut slot) = run_log_slot().lock() {
                *slot = Some(file);
                return RunLogMirror { active: true };
            }
            RunLogMirror { active: false }
        }
        Err(e) => {
            eprintln!(
                "Warning: cannot mirror diagnostics to {}: {e}",
                path.display()
            );
            RunLogMirror { active: false }
        }
    }
}

fn filter_from(config: &LoggingConfig) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let mut filter_str = config.default.clone();
        for (module, level) in &config.modules {
            filter_str.push_str(&format!(",{module}={level}"));
        }
        EnvFilter::new(&filter_str)
    }
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only the first
/// call takes effect).
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let terminal_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter_from(config));

        let run_log_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_timer(RunLogTime)
            .with_level(true)
            .with_writer(RunLogWriter)
            .with_filter(filter_from(config));

        tracing_subscriber::registry()
            .with(terminal_layer)
            .with(run_log_layer)
            .init();
    });
}

/// Initialize logging with default configuration (`warn`, quiet operation).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}
