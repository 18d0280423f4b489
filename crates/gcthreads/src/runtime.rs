//! The embeddable context value: owns the thread registry, the
//! collaborators, and the critical-section lock, so multiple independent
//! runtimes can coexist in one process (the Open Question resolution
//! recorded in `DESIGN.md` — a context value instead of process globals).

use std::io;
use std::sync::Arc;
use std::time::Duration;

use gcthreads_core::collab::Collaborators;
use gcthreads_core::{CriticalSection, MutexFlags, Registry, ThreadDescriptor};

use crate::condvar::CondVar;
use crate::config::RuntimeConfig;
use crate::mutex::Mutex;
use crate::thread::Thread;

pub(crate) struct RuntimeInner<V, S> {
    pub(crate) registry: Arc<Registry<V, S>>,
    pub(crate) collab: Collaborators<V, S>,
    pub(crate) critical: CriticalSection,
    pub(crate) config: RuntimeConfig,
}

/// The top-level handle an embedder holds for one independent collection of
/// `gcthreads` threads, mutexes, and condition variables.
pub struct Runtime<V, S> {
    inner: Arc<RuntimeInner<V, S>>,
}

impl<V, S> Clone for Runtime<V, S> {
    fn clone(&self) -> Self {
        Runtime { inner: self.inner.clone() }
    }
}

impl<V: Send + 'static, S: Send + 'static> Runtime<V, S> {
    pub fn new(collab: Collaborators<V, S>) -> Self {
        Self::with_config(collab, RuntimeConfig::default())
    }

    pub fn with_config(collab: Collaborators<V, S>, config: RuntimeConfig) -> Self {
        Runtime {
            inner: Arc::new(RuntimeInner {
                registry: Arc::new(Registry::new()),
                collab,
                critical: CriticalSection::new(),
                config,
            }),
        }
    }

    /// Registers the calling OS thread as a `gcthreads` thread without
    /// spawning a new one — the entry point for a native thread the
    /// embedder did not create through [`Runtime::spawn`] (Guile's
    /// `guilify_self`).
    pub fn bootstrap_current_thread(&self, dynamic_state: S) -> io::Result<Thread<V, S>> {
        let descriptor = gcthreads_core::thread::bootstrap_current_thread(
            &self.inner.registry,
            self.inner.collab.async_hooks.as_ref(),
            dynamic_state,
        );
        Thread::new(descriptor, self.inner.clone())
    }

    /// **call-with-new-thread(thunk, handler?)** — spec §4.8. `parent_state`
    /// is the spawning thread's dynamic state value, handed to the
    /// collaborator's `make_dynamic_state` to derive the child's.
    ///
    /// `thunk` receives a [`Thread`] handle to the thread it is running on —
    /// there is no implicit "current thread" lookup, so this is the only way
    /// code inside the thunk can lock a [`crate::Mutex`] or wait on a
    /// [`crate::CondVar`] of its own.
    pub fn spawn(
        &self,
        parent_state: S,
        thunk: Box<dyn FnOnce(&Thread<V, S>) -> V + Send>,
        handler: Option<Box<dyn FnOnce(Box<dyn std::any::Any + Send>) -> V + Send>>,
    ) -> io::Result<Thread<V, S>> {
        let runtime = self.inner.clone();
        let core_thunk: Box<dyn FnOnce(&Arc<ThreadDescriptor<V, S>>) -> V + Send> =
            Box::new(move |descriptor| {
                let me = Thread::new(descriptor.clone(), runtime).expect("infallible");
                thunk(&me)
            });
        let descriptor = gcthreads_core::thread::spawn(
            self.inner.registry.clone(),
            self.inner.collab.clone(),
            parent_state,
            core_thunk,
            handler,
        );
        Thread::new(descriptor, self.inner.clone())
    }

    /// **all-threads** — spec §6. Descriptor snapshot only; each entry's own
    /// self-pipe is not reconstructed, since a snapshot is typically used
    /// for enumeration (`thread-exited?`, `cancel-thread`-by-predicate), not
    /// for blocking operations that need it.
    pub fn all_threads(&self) -> Vec<Arc<ThreadDescriptor<V, S>>> {
        self.inner.registry.all()
    }

    /// **yield** — spec §6. Gives pending asyncs a chance to run, then
    /// yields the OS thread's timeslice.
    pub fn yield_now(&self) {
        self.inner.collab.async_hooks.tick();
        std::thread::yield_now();
    }

    /// Blocks `me` for `timeout` (or [`RuntimeConfig::default_deadline_poll`]
    /// if `None`), interruptible by [`Thread::interrupt`] — spec §4.9's
    /// "std_sleep" suspension point, built directly on `std_select` with no
    /// file descriptors of interest.
    pub fn sleep(&self, me: &Thread<V, S>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout.unwrap_or(self.inner.config.default_deadline_poll);
        match gcthreads_core::select::std_select(
            &me.descriptor,
            self.inner.collab.gc.as_ref(),
            self.inner.collab.async_hooks.as_ref(),
            0,
            None,
            None,
            None,
            Some(timeout),
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc_eintr()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// **make-mutex([flags])**/**make-recursive-mutex** — spec §6.
    pub fn make_mutex(&self, flags: MutexFlags) -> Mutex<V, S> {
        Mutex::new(flags, self.inner.clone())
    }

    pub fn make_recursive_mutex(&self) -> Mutex<V, S> {
        Mutex::new_recursive(self.inner.clone())
    }

    /// **make-condition-variable** — spec §6.
    pub fn make_condvar(&self) -> CondVar<V, S> {
        CondVar::new(self.inner.clone())
    }

    /// Runs the stop-the-world protocol (component 4.4), suspending every
    /// other registered thread at a safe point, marking roots, and resuming.
    pub fn stop_the_world(&self, me: &Thread<V, S>)
    where
        V: Clone,
    {
        gcthreads_core::stopworld::stop_the_world(
            &self.inner.registry,
            &me.descriptor,
            self.inner.collab.gc.as_ref(),
        );
    }

    /// Enters the process-wide critical section (component 4.10).
    pub fn enter_critical_section(&self) -> parking_lot::ReentrantMutexGuard<'_, ()> {
        self.inner.critical.enter()
    }
}

/// `libc::EINTR` without pulling `libc` into the facade's own dependency
/// list — `gcthreads-core` already re-exports the raw select wrapper that
/// produces this code.
fn libc_eintr() -> i32 {
    gcthreads_core::select::EINTR
}
