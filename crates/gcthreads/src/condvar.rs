//! Facade-level condition variable: binds a [`gcthreads_core::CondVar`] to
//! the runtime's async hooks.

use std::sync::Arc;

use gcthreads_core::Deadline;

use crate::mutex::Mutex;
use crate::runtime::RuntimeInner;
use crate::thread::Thread;

pub struct CondVar<V, S> {
    inner: Arc<gcthreads_core::CondVar<V, S>>,
    runtime: Arc<RuntimeInner<V, S>>,
}

impl<V: Send + 'static, S: Send + 'static> CondVar<V, S> {
    pub(crate) fn new(runtime: Arc<RuntimeInner<V, S>>) -> Self {
        CondVar { inner: gcthreads_core::CondVar::new(), runtime }
    }

    /// **wait-condition-variable(cv, m[, time])** — spec §4.7. `mutex` must
    /// already be held by `me`.
    pub fn wait_timeout(
        &self,
        me: &Thread<V, S>,
        mutex: &Mutex<V, S>,
        deadline: Option<Deadline>,
    ) -> bool {
        self.inner.wait_timeout(
            &me.descriptor,
            mutex.core(),
            deadline,
            self.runtime.collab.async_hooks.as_ref(),
        )
    }

    /// **signal-condition-variable(cv)** — spec §4.7.
    pub fn signal(&self) {
        self.inner.signal();
    }

    /// **broadcast-condition-variable(cv)** — spec §4.7.
    pub fn broadcast(&self) {
        self.inner.broadcast();
    }
}
