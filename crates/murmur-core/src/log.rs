//! Pipeline logging.
//!
//! Every log line in the worker goes to stderr through the single [`emit`]
//! seam. Verbosity is a severity threshold rather than a flag: by default
//! info/warn/error lines print and per-chunk trace lines are suppressed;
//! `set_verbose(true)` lowers the threshold to include them.
//!
//! Job failures are reported through [`failure`], which carries the
//! classified [`ErrorCode`] next to the raw error so operators can grep for
//! a failure class (`rate_limited`, `invalid_audio`, ...) across worker
//! logs.
//!
//! # Macros
//!
//! - `verbose!()` - Per-chunk trace lines, suppressed unless verbose
//! - `info!()` - Job lifecycle progress
//! - `warn!()` - Degraded-but-continuing conditions (coverage gaps, retries)
//! - `error!()` - Failures

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use uuid::Uuid;

use crate::error::{ErrorCode, PipelineError};

/// Severity of a log line, ordered from chattiest to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Verbose = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Minimum severity that reaches stderr.
static THRESHOLD: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Enable or disable per-chunk trace output.
pub fn set_verbose(enabled: bool) {
    let threshold = if enabled { Level::Verbose } else { Level::Info };
    THRESHOLD.store(threshold as u8, Ordering::SeqCst);
}

/// Whether lines at `level` currently reach stderr.
pub fn enabled(level: Level) -> bool {
    level as u8 >= THRESHOLD.load(Ordering::SeqCst)
}

/// Single sink for every log line.
pub fn emit(level: Level, message: fmt::Arguments<'_>) {
    if enabled(level) {
        eprintln!("[{}] {}", level.as_str(), message);
    }
}

/// Report a failed job with its classified error code.
pub fn failure(job_id: Uuid, code: ErrorCode, err: &PipelineError) {
    emit(
        Level::Error,
        format_args!("job {job_id} failed ({code}): {err}"),
    );
}

/// Log a per-chunk trace line (suppressed unless verbose)
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Verbose, format_args!($($arg)*))
    };
}

/// Log a job-lifecycle progress line
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Info, format_args!($($arg)*))
    };
}

/// Log a degraded-but-continuing condition
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Warn, format_args!($($arg)*))
    };
}

/// Log a failure
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Error, format_args!($($arg)*))
    };
}
