//! Collaborator contracts (spec §1 "explicitly out of scope", §6 "consumed
//! from collaborators"). These traits are the boundary shape for subsystems
//! this crate never implements: the tracing collector's mark phase, the
//! async-signal delivery mechanism, dynamic-state/fluid storage, and the
//! continuation-barrier wrapper around a thread's root thunk.
//!
//! `gcthreads-core` only *calls* these; it never constructs a default
//! implementation, the same way `frankenlibc-core/src/setjmp/mod.rs` names
//! a real interface without pretending to implement the other side of it.

use std::os::fd::RawFd;

/// Hooks into the tracing collector. Only the mark-time boundary is
/// specified — `threads_mark_stacks`, `thread_put_to_sleep`,
/// `thread_wake_up`, and `thread_sleep_for_gc` are implemented by this
/// crate (see [`crate::stopworld`]) and exposed *to* the collector, not
/// implemented by it.
pub trait GcHooks<V>: Send + Sync {
    /// Mark every value in `roots` as reachable. Called once per suspended
    /// thread during [`crate::stopworld::stop_the_world`].
    fn mark_roots(&self, roots: &[V]);

    /// Register a block of non-managed memory the collector should be
    /// aware of (mirrors `register_collectable_memory`). Never called by
    /// this crate itself — it has no non-managed allocations of its own
    /// bookkeeping to report — this exists for the embedder to call about
    /// *its* allocations.
    fn register_collectable_memory(&self, tag: &'static str, bytes: usize) {
        let _ = (tag, bytes);
    }

    /// Reset a thread's allocation caches after the collector marked
    /// `clear_freelists_p` on it (spec §4.3).
    fn invalidate_thread_cache(&self) {}
}

/// Hooks into the asynchronous-interrupt delivery subsystem.
pub trait AsyncHooks: Send + Sync {
    /// Mirrors `setup_sleep`: records what the calling thread is about to
    /// block on (`fd`, when blocking on a self-pipe rather than a mutex),
    /// and reports whether an async is already pending for it, in which
    /// case the caller must not actually park.
    fn setup_sleep(&self, mutex_held: bool, fd: Option<RawFd>) -> bool;

    /// Clears whatever `setup_sleep` recorded.
    fn reset_sleep(&self);

    /// Drains and runs any asyncs queued for the current thread. Mirrors
    /// `SCM_TICK`/`scm_async_click`.
    fn tick(&self);

    /// Called on thread bring-up ([`crate::thread::spawn`],
    /// [`crate::thread::bootstrap_current_thread`]): start the dedicated
    /// signal-delivery thread if this is the first registered thread.
    fn ensure_signal_delivery_thread(&self) {}

    /// Called from teardown when [`crate::registry::Registry::count`] drops
    /// to zero: close the signal-delivery pipe, there is nobody left to
    /// deliver to.
    fn close_signal_pipe(&self) {}
}

/// Per-thread dynamic-state (fluid binding frame) factory.
pub trait DynamicStates<S>: Send + Sync {
    fn make_dynamic_state(&self, parent: &S) -> S;
    fn make_initial_dynamic_state(&self) -> S;
}

/// Wraps a thread's root thunk so non-local control transfer cannot cross
/// the boundary undetected (spec glossary: "continuation barrier").
///
/// Monomorphized over the managed value type `V` rather than generic over
/// an arbitrary return type: a thread's root thunk always produces exactly
/// one `V` (the thread's `result`), and a generic method would make this
/// trait impossible to use as `Arc<dyn ContinuationBarrier<V>>`.
pub trait ContinuationBarrier<V>: Send + Sync {
    fn run_in_barrier(&self, thunk: Box<dyn FnOnce() -> V + Send>) -> V;
}

/// Default barrier that just runs the thunk — appropriate for an embedder
/// with no non-local exits of its own (ordinary panics still unwind through
/// it like any other Rust call).
pub struct NoBarrier;

impl<V> ContinuationBarrier<V> for NoBarrier {
    fn run_in_barrier(&self, thunk: Box<dyn FnOnce() -> V + Send>) -> V {
        thunk()
    }
}

/// The full set of external collaborators a [`crate::registry::Registry`]
/// and its threads need, bundled for convenient construction.
pub struct Collaborators<V, S> {
    pub gc: std::sync::Arc<dyn GcHooks<V>>,
    pub async_hooks: std::sync::Arc<dyn AsyncHooks>,
    pub dynamic_states: std::sync::Arc<dyn DynamicStates<S>>,
    pub barrier: std::sync::Arc<dyn ContinuationBarrier<V>>,
}

impl<V, S> Clone for Collaborators<V, S> {
    fn clone(&self) -> Self {
        Collaborators {
            gc: self.gc.clone(),
            async_hooks: self.async_hooks.clone(),
            dynamic_states: self.dynamic_states.clone(),
            barrier: self.barrier.clone(),
        }
    }
}
