//! Critical-section lock (component 4.10).
//!
//! A process-wide recursive mutex guarding the small wait-queue primitives
//! in §4.1 against interleaving from other threads, outside the ordinary
//! GC-safe managed-mode discipline. Unlike [`crate::mutex::Mutex`], it has
//! no owner bookkeeping, no abandonment detection, and no wait queue of its
//! own — just mutual exclusion with recursive re-entry, so it is built
//! directly on [`parking_lot::ReentrantMutex`] rather than routing through
//! the fat mutex's thread-descriptor machinery.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Process-wide recursive lock. A single instance is expected to live for
/// the lifetime of the owning `Runtime` (see `gcthreads::Runtime`).
pub struct CriticalSection {
    lock: ReentrantMutex<()>,
}

impl CriticalSection {
    pub fn new() -> Self {
        CriticalSection { lock: ReentrantMutex::new(()) }
    }

    /// Enters the critical section, blocking if another thread holds it.
    /// Re-entrant: the same thread may call this again before releasing the
    /// first guard.
    pub fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn reentry_from_the_same_thread_does_not_deadlock() {
        let cs = CriticalSection::new();
        let outer = cs.enter();
        let inner = cs.enter();
        drop(inner);
        drop(outer);
    }

    #[test]
    fn excludes_concurrent_access_from_other_threads() {
        let cs = Arc::new(CriticalSection::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cs = cs.clone();
            let counter = counter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    let _guard = cs.enter();
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 8000);
    }
}
