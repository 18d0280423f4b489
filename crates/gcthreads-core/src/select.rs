//! Interruptible select (component 4.9).
//!
//! The only module in this crate compiled with unsafe code enabled — see
//! the `#[allow(unsafe_code)]` carve-out on this module's declaration in
//! `lib.rs`, the same way the libc workspace confines its raw syscall
//! surface to a single named module rather than scattering `unsafe` blocks
//! crate-wide.
//!
//! A thread about to block in `select(2)` first folds its self-pipe's read
//! end into the read set; the async subsystem wakes it by writing one byte
//! to the write end (`SelfPipe::notify`). On return, a fired self-pipe fd is
//! drained and stripped back out of the caller's view before the result is
//! reported, matching `scm_std_select`'s EINTR-on-wakeup-only contract.

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use crate::collab::{AsyncHooks, GcHooks};
use crate::descriptor::ThreadDescriptor;
use crate::gate::{enter_managed_mode, leave_managed_mode};

/// Re-exported so callers can recognize a self-pipe wakeup in the `Err`
/// returned by [`std_select`] without depending on `libc` themselves.
pub const EINTR: i32 = libc::EINTR;

/// A thread's private wake-up channel: the async subsystem pokes the write
/// end to interrupt a `std_select`/blocking sleep in progress.
pub struct SelfPipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl SelfPipe {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds is a valid 2-element buffer, as pipe(2) requires.
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        let (read_fd, write_fd) = (fds[0], fds[1]);
        set_nonblocking(read_fd)?;
        set_nonblocking(write_fd)?;
        Ok(SelfPipe { read_fd, write_fd })
    }

    pub fn write_fd(&self) -> RawFd {
        self.write_fd
    }

    /// Wakes whatever is parked reading this pipe's other end. A full pipe
    /// (EAGAIN) is not an error: a byte is already queued, which is all a
    /// waiter needs.
    pub fn notify(&self) {
        let byte = [1u8];
        // SAFETY: write_fd is open for this pipe's lifetime.
        unsafe {
            libc::write(self.write_fd, byte.as_ptr().cast(), 1);
        }
    }

    fn drain_one(&self) -> bool {
        let mut byte = [0u8; 1];
        // SAFETY: read_fd is open and non-blocking, so this cannot hang.
        let n = unsafe { libc::read(self.read_fd, byte.as_mut_ptr().cast(), 1) };
        n == 1
    }
}

impl Drop for SelfPipe {
    fn drop(&mut self) {
        // SAFETY: both fds are owned exclusively by this struct.
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fd was just returned by pipe(2) and is not yet shared.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is valid; flags was just read from the same fd.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// **std_select(nfds, r, w, x, timeout)** — spec §4.9.
///
/// `readfds` defaults to an empty set if `None`; `descriptor`'s own self-pipe
/// read end is always folded in and `nfds` widened to cover it. Leaves
/// managed mode for the actual `select(2)` call and re-enters on return. If
/// the self-pipe fd was the only one that fired, returns `EINTR`; otherwise
/// the self-pipe bit is cleared from the caller-visible set and the
/// remaining ready count is returned.
pub fn std_select<V, S>(
    descriptor: &Arc<ThreadDescriptor<V, S>>,
    gc: &dyn GcHooks<V>,
    hooks: &dyn AsyncHooks,
    nfds: i32,
    readfds: Option<&mut libc::fd_set>,
    writefds: Option<&mut libc::fd_set>,
    exceptfds: Option<&mut libc::fd_set>,
    timeout: Option<Duration>,
) -> io::Result<i32> {
    let pipe = descriptor.pipe();
    let mut owned_read: libc::fd_set;
    let read_set: &mut libc::fd_set = match readfds {
        Some(r) => r,
        None => {
            // SAFETY: fd_set is a POD bitmask; zero-initialized is valid.
            owned_read = unsafe { std::mem::zeroed() };
            // SAFETY: owned_read is a valid, stack-local fd_set.
            unsafe { libc::FD_ZERO(&mut owned_read) };
            &mut owned_read
        }
    };
    // SAFETY: read_set is a valid fd_set for the duration of this call.
    unsafe { libc::FD_SET(pipe.read_fd, read_set) };
    let nfds = nfds.max(pipe.read_fd + 1);

    while hooks.setup_sleep(false, Some(pipe.read_fd)) {
        hooks.tick();
    }

    let ticket = leave_managed_mode(descriptor);

    let mut tv = timeout.map(|d| libc::timeval {
        tv_sec: d.as_secs() as libc::time_t,
        tv_usec: libc::suseconds_t::from(d.subsec_micros()),
    });
    let tv_ptr = tv.as_mut().map_or(std::ptr::null_mut(), |t| t as *mut _);

    // SAFETY: every fd_set pointer below is either null or points at a
    // live, correctly-sized fd_set for the duration of the call; `nfds`
    // bounds the range select(2) inspects.
    let rc = unsafe {
        libc::select(
            nfds,
            read_set as *mut _,
            writefds.map_or(std::ptr::null_mut(), |w| w as *mut _),
            exceptfds.map_or(std::ptr::null_mut(), |x| x as *mut _),
            tv_ptr,
        )
    };
    let call_err = if rc < 0 { Some(io::Error::last_os_error()) } else { None };

    hooks.reset_sleep();
    enter_managed_mode(ticket, gc);

    if let Some(err) = call_err {
        return Err(err);
    }

    // SAFETY: read_set was just populated by the select(2) call above.
    let pipe_fired = unsafe { libc::FD_ISSET(pipe.read_fd, read_set) };
    if pipe_fired {
        pipe.drain_one();
        // SAFETY: read_set is still the same valid, stack-local fd_set.
        unsafe { libc::FD_CLR(pipe.read_fd, read_set) };
        if rc == 1 {
            return Err(io::Error::from_raw_os_error(libc::EINTR));
        }
        return Ok(rc - 1);
    }

    Ok(rc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ThreadDescriptor;
    use std::os::fd::RawFd as Fd;

    struct NullGc;
    impl GcHooks<u32> for NullGc {
        fn mark_roots(&self, _roots: &[u32]) {}
    }

    struct NeverPending;
    impl AsyncHooks for NeverPending {
        fn setup_sleep(&self, _mutex_held: bool, _fd: Option<Fd>) -> bool {
            false
        }
        fn reset_sleep(&self) {}
        fn tick(&self) {}
    }

    #[test]
    fn self_pipe_notify_wakes_a_select_with_no_other_fds() {
        let descriptor: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        descriptor.pipe().notify();

        let result = std_select(
            &descriptor,
            &NullGc,
            &NeverPending,
            0,
            None,
            None,
            None,
            Some(Duration::from_secs(5)),
        );
        assert!(matches!(result, Err(e) if e.raw_os_error() == Some(libc::EINTR)));
    }

    #[test]
    fn select_times_out_when_nothing_fires() {
        let descriptor: Arc<ThreadDescriptor<u32, ()>> = ThreadDescriptor::new_phase_one();
        let result = std_select(
            &descriptor,
            &NullGc,
            &NeverPending,
            0,
            None,
            None,
            None,
            Some(Duration::from_millis(20)),
        );
        assert_eq!(result.unwrap(), 0);
    }
}
