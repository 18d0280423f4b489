//! Condition variable (component 4.7): atomic-unlock-wait-relock, signal,
//! broadcast.
//!
//! The original C keeps the condvar's waiters queue unsynchronized,
//! relying on a "caller holds the associated mutex while signalling"
//! convention that safe Rust's aliasing rules cannot accept as-is.
//! `CondVar` therefore owns its own lock around its waiters queue for
//! memory safety, while [`CondVar::wait_timeout`] still enqueues onto it
//! *before* releasing the fat mutex's lock — preserving the documented
//! no-lost-wakeup property for callers that hold the mutex while
//! signalling, same as the original's contract.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex as Lock;

use crate::collab::AsyncHooks;
use crate::descriptor::ThreadDescriptor;
use crate::mutex::Mutex;
use crate::queue::WaitQueue;
use crate::time::Deadline;

pub struct CondVar<V, S> {
    waiters: Lock<WaitQueue<Arc<ThreadDescriptor<V, S>>>>,
}

impl<V: Send + 'static, S: Send + 'static> CondVar<V, S> {
    pub fn new() -> Arc<Self> {
        Arc::new(CondVar { waiters: Lock::new(WaitQueue::new()) })
    }

    /// **wait(C, M, deadline?)** — spec §4.7. `mutex` must be held by the
    /// caller. Returns `true` if woken by [`CondVar::signal`]/
    /// [`CondVar::broadcast`], `false` on timeout.
    ///
    /// The `level` decrement and ownership hand-off happen exactly once,
    /// before the retry loop — the historical source re-decrements inside
    /// the loop on every interrupted retry, which the spec's Open Question
    /// calls out as likely a bug for recursive mutexes; this lifts it out,
    /// per the spec's own instruction.
    pub fn wait_timeout(
        &self,
        me: &Arc<ThreadDescriptor<V, S>>,
        mutex: &Arc<Mutex<V, S>>,
        deadline: Option<Deadline>,
        hooks: &dyn AsyncHooks,
    ) -> bool {
        let mut mguard = mutex.state_lock();
        let relock_owner = mguard.owner.clone().expect("condvar wait requires the mutex held");

        let fully_released = mutex.release_one_level_pub(&mut mguard);
        if fully_released {
            mutex.unregister_held_pub(me);
        }

        // Tracks the mutex this wait is tied to, so cancellation mid-wait
        // has somewhere to look (spec §3 `held_mutex`); cleared before this
        // thread relocks and returns control to its caller.
        *me.held_mutex.lock() = Some(Arc::downgrade(mutex) as _);

        let mut handle = self.waiters.lock().enqueue(me.clone());

        let signalled = loop {
            if hooks.setup_sleep(true, None) {
                self.waiters.lock().remove(handle);
                *me.held_mutex.lock() = None;
                drop(mguard);
                let _ = mutex.lock_timeout(me, None, Some(relock_owner.clone()), hooks);
                return false;
            }

            me.block_asyncs.fetch_add(1, Ordering::AcqRel);
            let timed_out = match deadline {
                Some(d) => me.sleep_cond.wait_until(&mut mguard, d.into_instant()).timed_out(),
                None => {
                    me.sleep_cond.wait(&mut mguard);
                    false
                }
            };
            let still_queued = self.waiters.lock().remove(handle);
            me.block_asyncs.fetch_sub(1, Ordering::AcqRel);
            hooks.reset_sleep();

            if timed_out {
                break false;
            } else if me.is_canceled() {
                break false;
            } else if still_queued {
                hooks.tick();
                handle = self.waiters.lock().enqueue(me.clone());
                continue;
            } else {
                break true;
            }
        };

        *me.held_mutex.lock() = None;
        drop(mguard);
        let _ = mutex.lock_timeout(me, None, Some(relock_owner), hooks);
        signalled
    }

    /// **signal(C)**: wakes exactly one waiter, in FIFO order.
    pub fn signal(&self) {
        if let Some(t) = self.waiters.lock().dequeue() {
            t.sleep_cond.notify_one();
        }
    }

    /// **broadcast(C)**: wakes every waiter, in FIFO order.
    pub fn broadcast(&self) {
        let mut waiters = self.waiters.lock();
        while let Some(t) = waiters.dequeue() {
            t.sleep_cond.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::MutexFlags;
    use std::os::fd::RawFd;
    use std::sync::Barrier;
    use std::time::Duration;

    struct NeverPending;
    impl AsyncHooks for NeverPending {
        fn setup_sleep(&self, _mutex_held: bool, _fd: Option<RawFd>) -> bool {
            false
        }
        fn reset_sleep(&self) {}
        fn tick(&self) {}
    }

    #[test]
    fn timeout_returns_false_with_mutex_reacquired() {
        let m: Arc<Mutex<u32, ()>> = Mutex::new(MutexFlags::default());
        let t: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        let cv: Arc<CondVar<u32, ()>> = CondVar::new();
        m.lock_timeout(&t, None, None, &NeverPending).unwrap();

        let deadline = Deadline::after(Duration::from_millis(20));
        let woke = cv.wait_timeout(&t, &m, Some(deadline), &NeverPending);
        assert!(!woke);
        assert!(m.is_locked());
        assert!(Arc::ptr_eq(&m.owner().unwrap(), &t));
    }

    #[test]
    fn signal_wakes_one_waiter_across_threads() {
        let m: Arc<Mutex<u32, ()>> = Mutex::new(MutexFlags::default());
        let cv: Arc<CondVar<u32, ()>> = CondVar::new();
        let start = Arc::new(Barrier::new(2));

        let m2 = m.clone();
        let cv2 = cv.clone();
        let start2 = start.clone();
        let waiter = std::thread::spawn(move || {
            let t: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
            m2.lock_timeout(&t, None, None, &NeverPending).unwrap();
            start2.wait();
            let woke = cv2.wait_timeout(&t, &m2, None, &NeverPending);
            m2.unlock(&t).unwrap();
            woke
        });

        start.wait();
        // Give the waiter a moment to actually park before signalling.
        std::thread::sleep(Duration::from_millis(50));
        let signaller: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        m.lock_timeout(&signaller, None, None, &NeverPending).unwrap();
        cv.signal();
        m.unlock(&signaller).unwrap();

        assert!(waiter.join().unwrap());
    }
}
