//! Facade-level thread handle: a [`gcthreads_core::ThreadDescriptor`] and a
//! back-reference to the runtime that owns its collaborators, so every
//! method reads naturally as `thread.join_timeout(&me, deadline)` instead of
//! threading hooks through every call site by hand.

use std::io;
use std::sync::Arc;

use gcthreads_core::{CoreResult, Deadline, ThreadDescriptor};

use crate::runtime::RuntimeInner;

pub struct Thread<V, S> {
    pub(crate) descriptor: Arc<ThreadDescriptor<V, S>>,
    pub(crate) runtime: Arc<RuntimeInner<V, S>>,
}

impl<V: Send + 'static, S: Send + 'static> Thread<V, S> {
    pub(crate) fn new(
        descriptor: Arc<ThreadDescriptor<V, S>>,
        runtime: Arc<RuntimeInner<V, S>>,
    ) -> io::Result<Self> {
        Ok(Thread { descriptor, runtime })
    }

    /// **cancel-thread(t)** — spec §4.8. Also pokes the target's self-pipe
    /// so a thread parked in [`crate::Runtime::sleep`]/`std_select` wakes,
    /// not just one parked on a `gcthreads-core` wait queue.
    pub fn cancel(&self) {
        gcthreads_core::thread::cancel(&self.descriptor);
        self.interrupt();
    }

    /// **set-thread-cleanup!(t, proc)** — spec §4.8.
    pub fn set_cleanup(&self, cleanup: Box<dyn FnOnce() -> V + Send>) -> CoreResult<()> {
        gcthreads_core::thread::set_cleanup(&self.descriptor, cleanup)
    }

    /// **thread-exited?(t)** — spec §4.8.
    pub fn has_exited(&self) -> bool {
        gcthreads_core::thread::has_exited(&self.descriptor)
    }

    /// **join-thread(t[, timeout[, default]])** — spec §4.8. `self` is the
    /// thread being joined; `me` is the calling thread.
    pub fn join_timeout(
        &self,
        me: &Thread<V, S>,
        deadline: Option<Deadline>,
    ) -> CoreResult<Option<V>>
    where
        V: Clone,
    {
        gcthreads_core::thread::join_timeout(
            &me.descriptor,
            &self.descriptor,
            deadline,
            self.runtime.collab.async_hooks.as_ref(),
        )
    }

    /// Writes one byte into this thread's self-pipe, waking it out of a
    /// [`crate::Runtime::sleep`] or raw `std_select` in progress — the
    /// mechanism spec §4.9 names as how async delivery interrupts a
    /// blocked thread.
    pub fn interrupt(&self) {
        self.descriptor.pipe().notify();
    }
}
