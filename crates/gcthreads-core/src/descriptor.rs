//! Thread descriptor (component 4.2, spec §3).
//!
//! Bring-up is modeled as the two-phase sequence spec §4.2 describes
//! (`new` corresponds to phase 1; [`ThreadDescriptor::enter_phase_two`] to
//! phase 2) and teardown as the two-stage sequence in
//! [`crate::thread::run_teardown`].

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};

use crate::gate::HeapLock;
use crate::queue::WaitQueue;
use crate::select::SelfPipe;

/// A mutex this thread currently owns, kept only so teardown can wake
/// whoever is waiting on it (spec: "release every still-held mutex's wait
/// queue"). Implemented by [`crate::mutex::Mutex`].
///
/// Held as `Weak` from the owning thread (see [`ThreadDescriptor::mutexes_held`])
/// to avoid an uncollectable `Arc` cycle with [`crate::mutex::Mutex::owner`],
/// which must stay a strong reference so abandonment detection can read
/// `owner.has_exited()` after the owning thread's own descriptor would
/// otherwise have dropped its last strong reference.
pub(crate) trait OwnedMutexHandle<V, S>: Send + Sync {
    /// Wake one waiter (if any) so it re-evaluates and discovers the
    /// abandoned-mutex condition for itself. Does not touch ownership.
    fn wake_one_waiter_on_abandon(self: Arc<Self>);
}

/// Mutable fields protected by `admin_mutex` in the original (spec §3):
/// `exited`, `canceled`, `cleanup_thunk`, the thread's own result, and
/// "join queue membership changes initiated by others" — the join queue
/// lives here rather than behind its own lock precisely because spec §3
/// names it as one of the fields `admin_mutex` protects, and
/// [`crate::thread::join_timeout`]'s `block` call needs the queue reachable
/// from the same guard that protects `exited`.
pub(crate) struct AdminState<V, S> {
    pub(crate) exited: bool,
    pub(crate) canceled: bool,
    pub(crate) cleanup_thunk: Option<Box<dyn FnOnce() -> V + Send>>,
    pub(crate) result: Option<V>,
    pub(crate) join_queue: WaitQueue<Arc<ThreadDescriptor<V, S>>>,
}

impl<V, S> AdminState<V, S> {
    fn new() -> Self {
        AdminState {
            exited: false,
            canceled: false,
            cleanup_thunk: None,
            result: None,
            join_queue: WaitQueue::new(),
        }
    }
}

/// Per-thread state (spec §3's thread descriptor `T`).
pub struct ThreadDescriptor<V, S> {
    pub(crate) std_id: std::thread::ThreadId,

    /// `managed_handle`: a GC root referring back to this descriptor,
    /// modeled as `Weak` to avoid a self-cycle — the descriptor's `Arc` is
    /// what actually keeps it alive.
    self_handle: Mutex<Weak<ThreadDescriptor<V, S>>>,

    pub(crate) admin: Mutex<AdminState<V, S>>,
    pub(crate) mutexes_held: Mutex<Vec<Weak<dyn OwnedMutexHandle<V, S>>>>,
    pub(crate) dynamic_state: Mutex<Option<S>>,

    /// Explicit GC roots, the portable substitute for a raw register
    /// snapshot (see `SPEC_FULL.md` §3).
    pub(crate) roots: Mutex<Vec<V>>,
    pub(crate) at_safe_point: AtomicBool,

    pub(crate) heap: HeapLock,
    pub(crate) sleep_cond: Condvar,
    pub(crate) sleep_object: Mutex<Option<V>>,

    /// This thread's own wake-up channel (spec §4.9). Lives here, not in
    /// whatever wrapper an embedder builds around the descriptor, so there
    /// is exactly one pipe per thread regardless of how many handles to it
    /// exist.
    pipe: SelfPipe,

    /// The mutex currently held across a condvar wait, so cancellation can
    /// release it (spec §3 `held_mutex`).
    pub(crate) held_mutex: Mutex<Option<Weak<dyn OwnedMutexHandle<V, S>>>>,

    pub(crate) block_asyncs: AtomicI32,
    pub(crate) pending_asyncs: AtomicBool,
    pub(crate) clear_freelists: AtomicBool,
}

impl<V, S> ThreadDescriptor<V, S> {
    /// Phase 1 (pre-managed) bring-up: allocate the descriptor with
    /// `heap_mutex` already held, `block_asyncs = 1`, and no managed state
    /// yet installed.
    pub(crate) fn new_phase_one() -> Arc<Self> {
        let descriptor = Arc::new(ThreadDescriptor {
            std_id: std::thread::current().id(),
            self_handle: Mutex::new(Weak::new()),
            admin: Mutex::new(AdminState::new()),
            mutexes_held: Mutex::new(Vec::new()),
            dynamic_state: Mutex::new(None),
            roots: Mutex::new(Vec::new()),
            at_safe_point: AtomicBool::new(false),
            heap: HeapLock::new_locked(),
            sleep_cond: Condvar::new(),
            sleep_object: Mutex::new(None),
            pipe: SelfPipe::new().expect("failed to create thread self-pipe"),
            held_mutex: Mutex::new(None),
            block_asyncs: AtomicI32::new(1),
            pending_asyncs: AtomicBool::new(false),
            clear_freelists: AtomicBool::new(false),
        });
        *descriptor.self_handle.lock() = Arc::downgrade(&descriptor);
        descriptor
    }

    /// Phase 2 (managed) bring-up: install dynamic state and clear
    /// `block_asyncs` so asyncs may now be delivered.
    pub(crate) fn enter_phase_two(self: &Arc<Self>, dynamic_state: S) {
        *self.dynamic_state.lock() = Some(dynamic_state);
        self.block_asyncs.store(0, Ordering::Release);
    }

    pub fn handle(&self) -> Weak<ThreadDescriptor<V, S>> {
        self.self_handle.lock().clone()
    }

    pub fn has_exited(&self) -> bool {
        self.admin.lock().exited
    }

    pub fn is_canceled(&self) -> bool {
        self.admin.lock().canceled
    }

    /// Pushes a value onto this thread's explicit GC root list, so it
    /// survives a GC cycle that runs while the thread is parked (spec
    /// §4.5's `sleep_object` root).
    pub fn push_root(&self, value: V) {
        self.roots.lock().push(value);
    }

    pub fn pop_root(&self) -> Option<V> {
        self.roots.lock().pop()
    }

    /// This thread's self-pipe (spec §4.9), shared by every handle to this
    /// descriptor rather than owned per-wrapper.
    pub fn pipe(&self) -> &SelfPipe {
        &self.pipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_one_starts_with_block_asyncs_one_and_not_exited() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        assert_eq!(d.block_asyncs.load(Ordering::Acquire), 1);
        assert!(!d.has_exited());
        assert!(!d.is_canceled());
    }

    #[test]
    fn phase_two_clears_block_asyncs() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        d.enter_phase_two(());
        assert_eq!(d.block_asyncs.load(Ordering::Acquire), 0);
    }

    #[test]
    fn self_handle_upgrades_to_the_same_descriptor() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        let upgraded = d.handle().upgrade().expect("self handle should be live");
        assert!(Arc::ptr_eq(&d, &upgraded));
    }

    #[test]
    fn roots_push_pop_in_lifo_order() {
        let d: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        d.push_root(1);
        d.push_root(2);
        assert_eq!(d.pop_root(), Some(2));
        assert_eq!(d.pop_root(), Some(1));
        assert_eq!(d.pop_root(), None);
    }
}
