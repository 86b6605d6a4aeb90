//! Process-wide state for playcore
//!
//! The library keeps two pieces of global state: the log-report flag and
//! the I/O statistics hook registry. Both sit behind an explicit
//! [`global_init`] / [`global_uninit`] pair; nothing is set up implicitly.

pub mod io_stat;

pub use io_stat::{
    io_stat_complete_register, io_stat_register, report_complete, report_read, IoStatComplete,
    IO_STAT_READ,
};

use std::sync::atomic::{AtomicBool, Ordering};

static LOG_REPORT: AtomicBool = AtomicBool::new(false);

/// Prepare process-wide state. Calling it again while initialized is a no-op.
pub fn global_init() {
    if io_stat::init() {
        log::info!("playcore v{} initialized", env!("CARGO_PKG_VERSION"));
    }
}

/// Tear down process-wide state, dropping registered I/O hooks
pub fn global_uninit() {
    if io_stat::uninit() {
        LOG_REPORT.store(false, Ordering::SeqCst);
        log::info!("playcore uninitialized");
    }
}

/// Whether [`global_init`] has run without a matching [`global_uninit`]
pub fn is_initialized() -> bool {
    io_stat::is_initialized()
}

/// Log every posted message at `info` instead of `trace`
pub fn global_set_log_report(enabled: bool) {
    LOG_REPORT.store(enabled, Ordering::SeqCst);
}

pub fn log_report_enabled() -> bool {
    LOG_REPORT.load(Ordering::Relaxed)
}
