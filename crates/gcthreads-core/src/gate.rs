//! Managed-mode gate (component 4.3).
//!
//! The heap-mutex-per-thread is the GC's suspension lever: a thread is
//! definitely not executing managed code while someone else holds its
//! `heap_mutex`. This implies managed threads must release their
//! heap-mutex before any potentially long blocking system call — that is
//! the whole purpose of the gate.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::{Condvar, Mutex};

use crate::collab::GcHooks;
use crate::descriptor::ThreadDescriptor;

/// A binary lock toggled from two different call sites (the owning thread,
/// and the GC thread during stop-the-world) rather than RAII-scoped like an
/// ordinary `Mutex` guard — spec §4.3 has the owning thread release it at
/// the gate and the GC acquire it from a different thread entirely, which
/// doesn't fit a guard whose lifetime is tied to one stack frame.
pub struct HeapLock {
    /// `true` while logically held (thread is in managed mode).
    locked: Mutex<bool>,
    cond: Condvar,
}

impl HeapLock {
    pub(crate) fn new_locked() -> Self {
        HeapLock { locked: Mutex::new(true), cond: Condvar::new() }
    }

    pub fn lock(&self) {
        let mut locked = self.locked.lock();
        while *locked {
            self.cond.wait(&mut locked);
        }
        *locked = true;
    }

    pub fn unlock(&self) {
        let mut locked = self.locked.lock();
        *locked = false;
        self.cond.notify_one();
    }

    /// Releases the lock and parks on `wake_up_cond` until the GC broadcasts
    /// it, then re-acquires — used by [`crate::stopworld::sleep_for_gc`]
    /// when a thread wants to reach a safe point without leaving managed
    /// mode through the ordinary gate.
    pub(crate) fn park_for_gc(&self, wake_up_cond: &Condvar) {
        let mut locked = self.locked.lock();
        *locked = false;
        self.cond.notify_one();
        wake_up_cond.wait(&mut locked);
        *locked = true;
    }
}

/// Opaque ticket returned by [`leave_managed_mode`], required to call
/// [`enter_managed_mode`].
pub struct Ticket<V, S> {
    descriptor: Arc<ThreadDescriptor<V, S>>,
}

/// Snapshot the thread's safe-point state and release `heap_mutex`.
pub fn leave_managed_mode<V, S>(descriptor: &Arc<ThreadDescriptor<V, S>>) -> Ticket<V, S> {
    descriptor.at_safe_point.store(true, Ordering::Release);
    descriptor.heap.unlock();
    Ticket { descriptor: descriptor.clone() }
}

/// Re-acquire `heap_mutex` and clear the safe-point flag. If the GC set
/// `clear_freelists_p` while this thread was out, resets its allocation
/// caches via [`GcHooks::invalidate_thread_cache`].
pub fn enter_managed_mode<V, S>(ticket: Ticket<V, S>, gc: &dyn GcHooks<V>) {
    ticket.descriptor.heap.lock();
    ticket.descriptor.at_safe_point.store(false, Ordering::Release);
    if ticket.descriptor.clear_freelists.swap(false, Ordering::AcqRel) {
        gc.invalidate_thread_cache();
    }
}

/// Runs `f` with `heap_mutex` released, re-acquiring it afterward even if
/// `f` panics (spec's "run foreign function with no managed access").
///
/// Calling back into a managed-mode API from within `f` is undefined
/// behavior, per spec §4.3 — the gate must be re-entered first.
pub fn without_managed_mode<V, S, R>(
    descriptor: &Arc<ThreadDescriptor<V, S>>,
    gc: &dyn GcHooks<V>,
    f: impl FnOnce() -> R,
) -> R {
    let ticket = leave_managed_mode(descriptor);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    enter_managed_mode(ticket, gc);
    match result {
        Ok(r) => r,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NoBarrier;
    use std::sync::atomic::AtomicBool;

    struct NullGc(AtomicBool);
    impl GcHooks<u32> for NullGc {
        fn mark_roots(&self, _roots: &[u32]) {}
        fn invalidate_thread_cache(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn heap_lock_excludes_concurrent_lockers() {
        let lock = Arc::new(HeapLock::new_locked());
        lock.unlock();
        lock.lock();
        assert!(*lock.locked.lock());
    }

    #[test]
    fn leave_and_enter_roundtrip_clears_safe_point() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        let gc = NullGc(AtomicBool::new(false));
        let ticket = leave_managed_mode(&d);
        assert!(d.at_safe_point.load(Ordering::Acquire));
        enter_managed_mode(ticket, &gc);
        assert!(!d.at_safe_point.load(Ordering::Acquire));
    }

    #[test]
    fn clear_freelists_triggers_invalidation_hook() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        let gc = NullGc(AtomicBool::new(false));
        d.clear_freelists.store(true, Ordering::Release);
        let ticket = leave_managed_mode(&d);
        enter_managed_mode(ticket, &gc);
        assert!(gc.0.load(Ordering::SeqCst));
    }

    #[test]
    fn without_managed_mode_restores_managed_state() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        let gc = NullGc(AtomicBool::new(false));
        let _ = &NoBarrier;
        let result = without_managed_mode(&d, &gc, || 7);
        assert_eq!(result, 7);
        assert!(!d.at_safe_point.load(Ordering::Acquire));
    }
}
