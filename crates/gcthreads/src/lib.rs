//! Surface API for embedding `gcthreads-core` into an interpreter runtime
//! (spec §6 "External interfaces").
//!
//! A [`Runtime`] owns the thread registry and the collaborator set; threads,
//! mutexes, and condition variables are created from it and carry their own
//! reference back to it, so call sites read as `thing.method(&me, ...)`
//! instead of threading hooks through every call by hand.

#![forbid(unsafe_code)]

mod condvar;
mod config;
mod mutex;
mod runtime;
mod thread;

pub use condvar::CondVar;
pub use config::RuntimeConfig;
pub use gcthreads_core::collab::{
    AsyncHooks, Collaborators, ContinuationBarrier, DynamicStates, GcHooks, NoBarrier,
};
pub use gcthreads_core::{CoreError, CoreResult, Deadline, LockOutcome, MutexFlags, ThreadDescriptor};
pub use mutex::Mutex;
pub use runtime::Runtime;
pub use thread::Thread;
