//! Global thread registry (component 4.2, spec §3 "Global registry").
//!
//! Guarded the way `thread_admin_mutex`/`all_threads` are guarded in
//! `threads.c`. "Ownership transfers to the GC" on exit (spec §3
//! "Ownership") is modeled by `Arc` itself: the registry drops its strong
//! reference in [`Registry::unlink`], and the descriptor lives on exactly
//! as long as some other `Arc` (a join-queue entry, an embedder-held
//! handle) still references it.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::descriptor::ThreadDescriptor;

/// Registry of all live threads, plus the condvar the stop-the-world
/// protocol uses to wake parked threads (spec §4.4 `wake_up_cond`).
pub struct Registry<V, S> {
    threads: Mutex<Vec<Arc<ThreadDescriptor<V, S>>>>,
    pub(crate) wake_up_cond: Condvar,
}

impl<V, S> Registry<V, S> {
    pub fn new() -> Self {
        Registry { threads: Mutex::new(Vec::new()), wake_up_cond: Condvar::new() }
    }

    pub(crate) fn link(&self, descriptor: Arc<ThreadDescriptor<V, S>>) {
        self.threads.lock().push(descriptor);
    }

    pub(crate) fn unlink(&self, descriptor: &Arc<ThreadDescriptor<V, S>>) {
        self.threads.lock().retain(|t| !Arc::ptr_eq(t, descriptor));
    }

    pub fn count(&self) -> usize {
        self.threads.lock().len()
    }

    /// A snapshot of every currently-live descriptor.
    pub fn all(&self) -> Vec<Arc<ThreadDescriptor<V, S>>> {
        self.threads.lock().clone()
    }

    /// Locks the registry for the duration of the closure, per spec §4.4
    /// step 2 ("acquire `registry_mutex`") through step 8 ("release
    /// `registry_mutex`"). Used only by [`crate::stopworld::stop_the_world`].
    pub(crate) fn lock_all(&self) -> MutexGuard<'_, Vec<Arc<ThreadDescriptor<V, S>>>> {
        self.threads.lock()
    }
}

impl<V, S> Default for Registry<V, S> {
    fn default() -> Self {
        Self::new()
    }
}
