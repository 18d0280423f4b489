//! Threading and synchronization runtime for a managed-memory interpreter
//! coexisting with a stop-the-world collector.
//!
//! `gcthreads-core` implements the ten components a tracing-GC interpreter
//! needs from its threading layer: a FIFO wait-queue, a per-thread
//! descriptor and global registry, a managed-mode gate the collector uses
//! to suspend threads at safe points, the stop-the-world protocol itself,
//! the generic block/unblock primitive every other wait builds on, a
//! recursive "fat" mutex with abandonment detection, a condition variable,
//! thread lifecycle management, an interruptible `select(2)` wrapper, and a
//! process-wide critical-section lock.
//!
//! Every type here is generic over two embedder-supplied types: `V`, the
//! managed value type (thunk results, condvar/mutex sleep roots), and `S`,
//! the interpreter's opaque per-thread state bundle. The collector, async
//! subsystem, dynamic-state facility, and continuation barrier are named as
//! trait objects in [`collab`] — this crate calls them, never implements
//! them.
//!
//! `unsafe` is denied crate-wide except in [`select`], which wraps
//! `select(2)` and a self-pipe.

#![deny(unsafe_code)]

pub mod block;
pub mod collab;
pub mod condvar;
pub mod critical;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod mutex;
pub mod queue;
pub mod registry;
#[allow(unsafe_code)]
pub mod select;
pub mod stopworld;
pub mod thread;
pub mod time;

pub use collab::{AsyncHooks, Collaborators, ContinuationBarrier, DynamicStates, GcHooks, NoBarrier};
pub use condvar::CondVar;
pub use critical::CriticalSection;
pub use descriptor::ThreadDescriptor;
pub use error::{CoreError, CoreResult};
pub use mutex::{LockOutcome, Mutex, MutexFlags};
pub use queue::{QueueHandle, WaitQueue};
pub use registry::Registry;
pub use select::SelfPipe;
pub use time::Deadline;
