//! Error taxonomy for the core engine (spec §7).
//!
//! `abandoned-mutex`, `interrupted`, and `timed-out` are deliberately not
//! variants here: the first is folded into the `Ok` path as
//! [`crate::mutex::LockOutcome::Abandoned`], the second never escapes
//! [`crate::block::block`], and the third surfaces as `None`/`false` from
//! the timed public entry points. A cancellation delivered mid-wait
//! surfaces the same way as a timeout — `None`/`false` — rather than as its
//! own variant here; [`crate::descriptor::ThreadDescriptor::is_canceled`]
//! is how a caller tells the two apart.

use std::io;

/// Errors raised at the API boundary by the core engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("wrong type of argument: {0}")]
    ArgumentType(&'static str),

    #[error("a thread cannot join itself")]
    JoinSelf,

    #[error("mutex not locked")]
    MutexNotLocked,

    #[error("mutex not locked by current thread")]
    MutexWrongThread,

    #[error("mutex already locked by the calling thread")]
    MutexAlreadyLockedByThread,

    #[error("system error: {0}")]
    System(#[from] io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
