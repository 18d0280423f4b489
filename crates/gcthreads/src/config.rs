//! Creation-time configuration (ambient stack: no config-file/serde layer,
//! since nothing in this subsystem is externally configured at runtime
//! beyond creation flags — see `MutexFlags` in `gcthreads-core::mutex`).

use std::time::Duration;

/// Runtime-wide defaults. Currently only governs [`crate::Runtime::sleep`]'s
/// fallback duration when the caller doesn't supply one.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub default_deadline_poll: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig { default_deadline_poll: Duration::from_millis(10) }
    }
}
