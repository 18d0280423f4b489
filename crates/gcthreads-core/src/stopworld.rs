//! Stop-the-world protocol (component 4.4).
//!
//! `threads_mark_stacks`, `thread_put_to_sleep`, `thread_wake_up`, and
//! `thread_sleep_for_gc` are implemented here and exposed *to* the
//! collaborating collector. Of [`crate::collab::GcHooks`]'s methods, this
//! crate only ever calls `mark_roots` (here) and `invalidate_thread_cache`
//! ([`crate::gate`]) — `register_collectable_memory` crosses the boundary
//! the other way, a hook for the embedder's own non-managed allocations,
//! never called internally (see `SPEC_FULL.md` §2).

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::collab::GcHooks;
use crate::descriptor::ThreadDescriptor;
use crate::gate::{enter_managed_mode, leave_managed_mode};
use crate::registry::Registry;

/// Runs the stop-the-world sequence: every other thread is paused at a
/// safe point, its roots are marked, and it is resumed. `self_descriptor`
/// is the GC thread's own descriptor (itself in managed mode on entry, per
/// spec §4.4).
pub fn stop_the_world<V: Clone, S>(
    registry: &Registry<V, S>,
    self_descriptor: &Arc<ThreadDescriptor<V, S>>,
    gc: &dyn GcHooks<V>,
) {
    // Step 1: leave managed mode.
    let ticket = leave_managed_mode(self_descriptor);

    // Step 2: acquire registry_mutex (held for the whole sequence, released
    // at the very end — spec §5 "release in reverse").
    let threads = registry.lock_all();
    let others: Vec<&Arc<ThreadDescriptor<V, S>>> =
        threads.iter().filter(|t| !Arc::ptr_eq(t, self_descriptor)).collect();

    // Steps 3-4: acquire every other thread's heap_mutex. Blocks until each
    // either leaves managed mode via the gate, or parks itself via
    // sleep_for_gc.
    for t in &others {
        t.heap.lock();
    }

    // Step 6: mark stacks (renumbered relative to spec: go_to_sleep is a
    // pure bookkeeping flag for diagnostics in the original and has no
    // observable effect once every heap_mutex is held, so it is not
    // modeled here).
    for t in &others {
        debug_assert!(t.at_safe_point.load(Ordering::Acquire));
        let roots = t.roots.lock().clone();
        gc.mark_roots(&roots);
    }

    // Step 7: optionally invalidate allocation caches on resume.
    for t in &others {
        t.clear_freelists.store(true, Ordering::Release);
    }

    // Step 8: wake everyone, release every heap_mutex, release the
    // registry, re-enter managed mode.
    registry.wake_up_cond.notify_all();
    for t in &others {
        t.heap.unlock();
    }
    drop(threads);
    enter_managed_mode(ticket, gc);
}

/// Lets a thread reach a safe point without leaving managed mode through
/// the ordinary gate: snapshot is implicit in the `at_safe_point` flag,
/// then park on `wake_up_cond` using `heap_mutex`.
pub fn sleep_for_gc<V, S>(descriptor: &Arc<ThreadDescriptor<V, S>>, registry: &Registry<V, S>) {
    descriptor.at_safe_point.store(true, Ordering::Release);
    descriptor.heap.park_for_gc(&registry.wake_up_cond);
    descriptor.at_safe_point.store(false, Ordering::Release);
}
