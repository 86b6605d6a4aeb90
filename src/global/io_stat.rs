//! I/O statistics hooks
//!
//! Two independent process-wide callbacks: one fired per read, one fired
//! when a stream finishes. Each may be registered once per init cycle.
//! Registration takes the write lock, so at most one writer touches the
//! registry at a time; reporting only clones the hook under the read lock
//! and invokes it unlocked.

use crate::utils::error::{PlayerError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// Type tag of a per-read report
pub const IO_STAT_READ: i32 = 1;

/// Payload of the stream-completion hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoStatComplete {
    pub url: String,
    pub read_bytes: i64,
    pub total_size: i64,
    pub elapsed_ms: i64,
    pub total_duration_ms: i64,
}

type ReadHook = Arc<dyn Fn(&str, i32, i64) + Send + Sync>;
type CompleteHook = Arc<dyn Fn(&IoStatComplete) + Send + Sync>;

#[derive(Default)]
struct Registry {
    initialized: bool,
    read: Option<ReadHook>,
    complete: Option<CompleteHook>,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

/// Returns `true` if this call performed the initialization
pub(crate) fn init() -> bool {
    let mut registry = REGISTRY.write();
    if registry.initialized {
        return false;
    }
    registry.initialized = true;
    true
}

/// Returns `true` if this call performed the teardown
pub(crate) fn uninit() -> bool {
    let mut registry = REGISTRY.write();
    if !registry.initialized {
        return false;
    }
    *registry = Registry::default();
    true
}

pub(crate) fn is_initialized() -> bool {
    REGISTRY.read().initialized
}

/// Register the per-read hook `(url, type, bytes)`
pub fn io_stat_register<F>(hook: F) -> Result<()>
where
    F: Fn(&str, i32, i64) + Send + Sync + 'static,
{
    let mut registry = REGISTRY.write();
    if !registry.initialized {
        return Err(PlayerError::Registry("global_init has not been called".to_string()));
    }
    if registry.read.is_some() {
        return Err(PlayerError::Registry("io-stat hook already registered".to_string()));
    }
    registry.read = Some(Arc::new(hook));
    log::debug!("io-stat hook registered");
    Ok(())
}

/// Register the stream-completion hook
pub fn io_stat_complete_register<F>(hook: F) -> Result<()>
where
    F: Fn(&IoStatComplete) + Send + Sync + 'static,
{
    let mut registry = REGISTRY.write();
    if !registry.initialized {
        return Err(PlayerError::Registry("global_init has not been called".to_string()));
    }
    if registry.complete.is_some() {
        return Err(PlayerError::Registry(
            "io-stat-complete hook already registered".to_string(),
        ));
    }
    registry.complete = Some(Arc::new(hook));
    log::debug!("io-stat-complete hook registered");
    Ok(())
}

/// Called by engines after each read
pub fn report_read(url: &str, kind: i32, bytes: i64) {
    let hook = REGISTRY.read().read.clone();
    if let Some(hook) = hook {
        hook(url, kind, bytes);
    }
}

/// Called by engines when a stream has been fully consumed
pub fn report_complete(stat: &IoStatComplete) {
    let hook = REGISTRY.read().complete.clone();
    if let Some(hook) = hook {
        hook(stat);
    }
}
