//! Fat mutex (component 4.6): recursive-or-not, checked-or-not,
//! externally-unlockable-or-not per immutable policy flags chosen at
//! creation, with a FIFO wait queue and ownership hand-off to the queue
//! head on unlock.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex as Lock, MutexGuard};

use crate::block::{block, unblock, BlockOutcome};
use crate::collab::AsyncHooks;
use crate::descriptor::{OwnedMutexHandle, ThreadDescriptor};
use crate::error::{CoreError, CoreResult};
use crate::queue::WaitQueue;
use crate::time::Deadline;

/// Immutable policy flags chosen at creation (spec §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct MutexFlags {
    pub recursive: bool,
    pub unchecked_unlock: bool,
    pub allow_external_unlock: bool,
}

impl MutexFlags {
    pub fn recursive() -> Self {
        MutexFlags { recursive: true, ..Default::default() }
    }
}

/// What [`Mutex::lock_timeout`] reports on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Lock succeeded, but the previous owner's thread had exited while
    /// still holding it (spec §7 `abandoned-mutex`). The caller decides
    /// whether to treat this as exceptional.
    Abandoned,
}

pub(crate) struct FatMutexState<V, S> {
    pub(crate) level: u32,
    pub(crate) owner: Option<Arc<ThreadDescriptor<V, S>>>,
    pub(crate) waiters: WaitQueue<Arc<ThreadDescriptor<V, S>>>,
}

/// The interpreter-level mutex (spec §4.6 "Fat mutex M").
pub struct Mutex<V, S> {
    state: Lock<FatMutexState<V, S>>,
    flags: MutexFlags,
}

impl<V: Send + 'static, S: Send + 'static> Mutex<V, S> {
    pub fn new(flags: MutexFlags) -> Arc<Self> {
        Arc::new(Mutex {
            state: Lock::new(FatMutexState { level: 0, owner: None, waiters: WaitQueue::new() }),
            flags,
        })
    }

    pub fn new_recursive() -> Arc<Self> {
        Self::new(MutexFlags::recursive())
    }

    pub fn owner(&self) -> Option<Arc<ThreadDescriptor<V, S>>> {
        self.state.lock().owner.clone()
    }

    pub fn level(&self) -> u32 {
        self.state.lock().level
    }

    pub fn is_locked(&self) -> bool {
        self.level() > 0
    }

    /// **lock(M, deadline?, owner?)** — spec §4.6. `owner` defaults to `me`.
    pub fn lock_timeout(
        self: &Arc<Self>,
        me: &Arc<ThreadDescriptor<V, S>>,
        deadline: Option<Deadline>,
        owner_override: Option<Arc<ThreadDescriptor<V, S>>>,
        hooks: &dyn AsyncHooks,
    ) -> CoreResult<Option<LockOutcome>> {
        let new_owner = owner_override.unwrap_or_else(|| me.clone());
        let mut guard = self.state.lock();
        loop {
            if guard.level == 0 {
                guard.level = 1;
                guard.owner = Some(new_owner.clone());
                drop(guard);
                self.register_held(&new_owner);
                return Ok(Some(LockOutcome::Acquired));
            }

            let owner = guard.owner.clone().expect("level > 0 implies an owner");

            if owner.has_exited() {
                guard.level = 1;
                guard.owner = Some(new_owner.clone());
                drop(guard);
                self.register_held(&new_owner);
                return Ok(Some(LockOutcome::Abandoned));
            } else if Arc::ptr_eq(&owner, &new_owner) {
                if self.flags.recursive {
                    guard.level += 1;
                    return Ok(Some(LockOutcome::Acquired));
                } else {
                    return Err(CoreError::MutexAlreadyLockedByThread);
                }
            } else {
                if let Some(d) = deadline {
                    if d.has_passed() {
                        return Ok(None);
                    }
                }
                match block(me, &mut guard, |s| &mut s.waiters, None, hooks, deadline) {
                    BlockOutcome::TimedOut | BlockOutcome::Canceled => return Ok(None),
                    BlockOutcome::Interrupted => {
                        hooks.tick();
                        continue;
                    }
                    BlockOutcome::Signalled => continue,
                }
            }
        }
    }

    /// **try-mutex**: never blocks; true iff an immediate lock would have
    /// succeeded without waiting.
    pub fn try_lock(
        self: &Arc<Self>,
        me: &Arc<ThreadDescriptor<V, S>>,
        hooks: &dyn AsyncHooks,
    ) -> CoreResult<Option<LockOutcome>> {
        self.lock_timeout(me, Some(Deadline::after(std::time::Duration::ZERO)), None, hooks)
    }

    /// **unlock(M)** (no condvar). See [`crate::condvar::CondVar::wait_timeout`]
    /// for the condvar-aware variant, which reuses [`Mutex::release_one_level`].
    pub fn unlock(self: &Arc<Self>, me: &Arc<ThreadDescriptor<V, S>>) -> CoreResult<()> {
        let mut guard = self.state.lock();
        self.check_unlock_policy(&mut guard, me)?;
        let fully_released = self.release_one_level(&mut guard);
        drop(guard);
        if fully_released {
            self.unregister_held(me);
        }
        Ok(())
    }

    /// Drops one level of ownership, handing off to the next waiter (if any)
    /// once `level` reaches zero. Returns whether this call was the one that
    /// reached zero, so callers that also maintain `mutexes_held` (this
    /// type's own [`Mutex::unlock`] and [`crate::condvar::CondVar::wait_timeout`])
    /// know whether ownership actually changed hands — a partial unlock of a
    /// recursive mutex leaves the caller still the owner.
    fn release_one_level(&self, guard: &mut MutexGuard<'_, FatMutexState<V, S>>) -> bool {
        if guard.level > 0 {
            guard.level -= 1;
        }
        if guard.level == 0 {
            guard.owner = unblock(guard, |s| &mut s.waiters);
            true
        } else {
            false
        }
    }

    /// Enforces the ownership policy matrix in spec §4.6, rewriting
    /// `guard.owner` to the calling thread for the "unchecked unlock of an
    /// unlocked mutex" case exactly as the original does.
    fn check_unlock_policy(
        &self,
        guard: &mut FatMutexState<V, S>,
        me: &Arc<ThreadDescriptor<V, S>>,
    ) -> CoreResult<()> {
        let is_owner = guard.owner.as_ref().is_some_and(|o| Arc::ptr_eq(o, me));
        if is_owner {
            return Ok(());
        }
        if guard.level == 0 {
            if !self.flags.unchecked_unlock {
                return Err(CoreError::MutexNotLocked);
            }
            guard.owner = Some(me.clone());
            Ok(())
        } else if self.flags.allow_external_unlock {
            Ok(())
        } else {
            Err(CoreError::MutexWrongThread)
        }
    }

    fn register_held(self: &Arc<Self>, owner: &Arc<ThreadDescriptor<V, S>>) {
        let handle: Weak<dyn OwnedMutexHandle<V, S>> = Arc::downgrade(self) as _;
        owner.mutexes_held.lock().push(handle);
    }

    fn unregister_held(self: &Arc<Self>, owner: &Arc<ThreadDescriptor<V, S>>) {
        let self_weak: Weak<dyn OwnedMutexHandle<V, S>> = Arc::downgrade(self) as _;
        owner.mutexes_held.lock().retain(|h| !h.ptr_eq(&self_weak));
    }

    /// Locks the mutex's own internal state for the duration of a condvar
    /// operation. Exposed `pub(crate)` only to [`crate::condvar`], which
    /// needs direct access to `level`/`owner`/`waiters` to implement the
    /// unlock-and-wait-and-relock sequence atomically with respect to
    /// `block`.
    pub(crate) fn state_lock(&self) -> MutexGuard<'_, FatMutexState<V, S>> {
        self.state.lock()
    }

    pub(crate) fn release_one_level_pub(&self, guard: &mut MutexGuard<'_, FatMutexState<V, S>>) -> bool {
        self.release_one_level(guard)
    }

    pub(crate) fn register_held_pub(self: &Arc<Self>, owner: &Arc<ThreadDescriptor<V, S>>) {
        self.register_held(owner);
    }

    pub(crate) fn unregister_held_pub(self: &Arc<Self>, owner: &Arc<ThreadDescriptor<V, S>>) {
        self.unregister_held(owner);
    }
}

impl<V: Send + 'static, S: Send + 'static> OwnedMutexHandle<V, S> for Mutex<V, S> {
    fn wake_one_waiter_on_abandon(self: Arc<Self>) {
        let mut guard = self.state.lock();
        let _ = unblock(&mut guard, |s| &mut s.waiters);
    }
}
