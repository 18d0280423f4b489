//! Facade-level mutex: binds a [`gcthreads_core::Mutex`] to the runtime's
//! async hooks so callers don't thread them through every call.

use std::sync::Arc;

use gcthreads_core::{CoreResult, Deadline, LockOutcome, MutexFlags};

use crate::runtime::RuntimeInner;
use crate::thread::Thread;

pub struct Mutex<V, S> {
    inner: Arc<gcthreads_core::Mutex<V, S>>,
    runtime: Arc<RuntimeInner<V, S>>,
}

impl<V: Send + 'static, S: Send + 'static> Mutex<V, S> {
    pub(crate) fn new(flags: MutexFlags, runtime: Arc<RuntimeInner<V, S>>) -> Self {
        Mutex { inner: gcthreads_core::Mutex::new(flags), runtime }
    }

    pub(crate) fn new_recursive(runtime: Arc<RuntimeInner<V, S>>) -> Self {
        Mutex { inner: gcthreads_core::Mutex::new_recursive(), runtime }
    }

    /// **lock-mutex(m[, timeout[, owner]])** — spec §4.6.
    pub fn lock_timeout(
        &self,
        me: &Thread<V, S>,
        deadline: Option<Deadline>,
        owner_override: Option<&Thread<V, S>>,
    ) -> CoreResult<Option<LockOutcome>> {
        self.inner.lock_timeout(
            &me.descriptor,
            deadline,
            owner_override.map(|t| t.descriptor.clone()),
            self.runtime.collab.async_hooks.as_ref(),
        )
    }

    /// **try-mutex(m)** — spec §4.6.
    pub fn try_lock(&self, me: &Thread<V, S>) -> CoreResult<Option<LockOutcome>> {
        self.inner.try_lock(&me.descriptor, self.runtime.collab.async_hooks.as_ref())
    }

    /// **unlock-mutex(m)** — spec §4.6 (no associated condvar; see
    /// [`crate::CondVar::wait_timeout`] for the atomic unlock-and-wait path).
    pub fn unlock(&self, me: &Thread<V, S>) -> CoreResult<()> {
        self.inner.unlock(&me.descriptor)
    }

    pub fn owner(&self) -> Option<Arc<gcthreads_core::ThreadDescriptor<V, S>>> {
        self.inner.owner()
    }

    pub fn level(&self) -> u32 {
        self.inner.level()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub(crate) fn core(&self) -> &Arc<gcthreads_core::Mutex<V, S>> {
        &self.inner
    }
}
