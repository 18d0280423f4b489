//! Block/unblock primitive (component 4.5) — the interruption nexus.
//!
//! Generic over the caller's lock type `T` via a queue-accessor closure,
//! since `block` is called with the fat mutex's internal state, the join
//! queue under a thread's admin state, and similar — there is no Rust
//! equivalent of passing a raw `pthread_mutex_t*` generically, so an
//! accessor closure into whatever `T` the caller's `MutexGuard` protects is
//! the idiomatic substitute.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::MutexGuard;

use crate::collab::AsyncHooks;
use crate::descriptor::ThreadDescriptor;
use crate::queue::WaitQueue;
use crate::time::Deadline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Woken by `unblock`: we were dequeued by a signaller.
    Signalled,
    /// Woken, but still found on the queue — an async wants our attention.
    Interrupted,
    /// The deadline elapsed before anyone signalled us.
    TimedOut,
    /// Woken because `cancel` marked us canceled, the same way an async
    /// delivery would — the caller gives up blocking rather than retrying.
    Canceled,
}

/// Parks `me` on the queue `queue` projects out of `guard`, releasing
/// `guard`'s mutex for the duration, per spec §4.5.
pub fn block<T, V, S>(
    me: &Arc<ThreadDescriptor<V, S>>,
    guard: &mut MutexGuard<'_, T>,
    queue: impl Fn(&mut T) -> &mut WaitQueue<Arc<ThreadDescriptor<V, S>>>,
    sleep_object: Option<V>,
    async_hooks: &dyn AsyncHooks,
    deadline: Option<Deadline>,
) -> BlockOutcome {
    if async_hooks.setup_sleep(true, None) {
        return BlockOutcome::Interrupted;
    }

    if let Some(obj) = sleep_object {
        me.push_root(obj);
    }

    me.block_asyncs.fetch_add(1, Ordering::AcqRel);
    let handle = queue(guard).enqueue(me.clone());

    let timed_out = match deadline {
        Some(d) => me.sleep_cond.wait_until(guard, d.into_instant()).timed_out(),
        None => {
            me.sleep_cond.wait(guard);
            false
        }
    };

    let still_queued = queue(guard).remove(handle);

    me.block_asyncs.fetch_sub(1, Ordering::AcqRel);
    async_hooks.reset_sleep();
    me.pop_root();

    if timed_out {
        BlockOutcome::TimedOut
    } else if me.is_canceled() {
        BlockOutcome::Canceled
    } else if still_queued {
        BlockOutcome::Interrupted
    } else {
        BlockOutcome::Signalled
    }
}

/// Wakes the head of the queue `queue` projects out of `guard`, if any.
/// Signalling a thread not actually parked on it is a no-op beyond a
/// spurious wake.
pub fn unblock<T, V, S>(
    guard: &mut MutexGuard<'_, T>,
    queue: impl FnOnce(&mut T) -> &mut WaitQueue<Arc<ThreadDescriptor<V, S>>>,
) -> Option<Arc<ThreadDescriptor<V, S>>> {
    let woken = queue(guard).dequeue();
    if let Some(t) = &woken {
        t.sleep_cond.notify_one();
    }
    woken
}
