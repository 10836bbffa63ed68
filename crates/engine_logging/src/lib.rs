#![deny(missing_docs)]
//! Shared logging utilities for the lotgrab workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every line logged
//! through the macros while a download run is active carries a `[run N]` tag,
//! so interleaved output from discovery, submission and completion events can
//! be attributed to the run that produced it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of the active download run. Zero means no run is active.
static ACTIVE_RUN: AtomicU64 = AtomicU64::new(0);

/// Marks `run_id` as the active run. Pass `0` to clear it.
///
/// Only one run is active per process at a time, so a process-wide slot is
/// enough; it also survives tokio moving tasks between worker threads.
pub fn set_active_run(run_id: u64) {
    ACTIVE_RUN.store(run_id, Ordering::Relaxed);
}

/// Returns the active run id, or `None` outside of a run.
pub fn active_run() -> Option<u64> {
    match ACTIVE_RUN.load(Ordering::Relaxed) {
        0 => None,
        id => Some(id),
    }
}

/// Clears the active run when dropped.
#[must_use = "the run tag is cleared as soon as the guard is dropped"]
pub struct RunGuard {
    _private: (),
}

/// Tags subsequent log lines with `run_id` until the returned guard is dropped.
pub fn enter_run(run_id: u64) -> RunGuard {
    set_active_run(run_id);
    RunGuard { _private: () }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        set_active_run(0);
    }
}

/// Formats the run tag prepended by the logging macros.
#[doc(hidden)]
pub fn run_tag() -> String {
    match active_run() {
        Some(id) => format!("[run {id}] "),
        None => String::new(),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::run_tag(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::run_tag(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::run_tag(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::run_tag(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::run_tag(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may already own the global logger.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Never,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_guard_tags_and_clears() {
        assert_eq!(run_tag(), "");
        {
            let _guard = enter_run(7);
            assert_eq!(active_run(), Some(7));
            assert_eq!(run_tag(), "[run 7] ");
        }
        assert_eq!(active_run(), None);
    }
}
