//! Deadlines (spec §6: "accept either a real number of seconds or a
//! (seconds, microseconds) pair; both become an absolute monotonic deadline
//! internally").

use std::time::{Duration, Instant};

/// An absolute point in time, monotonic-clock based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(pub(crate) Instant);

impl Deadline {
    /// A deadline `d` from now.
    pub fn after(d: Duration) -> Self {
        Deadline(Instant::now() + d)
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.0
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.0.checked_duration_since(Instant::now())
    }

    pub fn into_instant(self) -> Instant {
        self.0
    }
}

impl From<Duration> for Deadline {
    fn from(d: Duration) -> Self {
        Deadline::after(d)
    }
}

/// `(seconds, microseconds)` from now, mirroring `to_timespec`'s pair form.
impl From<(u64, u32)> for Deadline {
    fn from((secs, micros): (u64, u32)) -> Self {
        Deadline::after(Duration::new(secs, micros.saturating_mul(1_000)))
    }
}

/// A fractional number of seconds from now, mirroring `to_timespec`'s real
/// number form.
impl From<f64> for Deadline {
    fn from(secs: f64) -> Self {
        Deadline::after(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_is_in_the_future() {
        let d = Deadline::after(Duration::from_millis(10));
        assert!(!d.has_passed());
        std::thread::sleep(Duration::from_millis(30));
        assert!(d.has_passed());
    }

    #[test]
    fn pair_form_matches_duration_form() {
        let a = Deadline::from((1u64, 500_000u32));
        let b = Deadline::from(Duration::new(1, 500_000_000));
        let diff = if a.0 > b.0 { a.0 - b.0 } else { b.0 - a.0 };
        assert!(diff < Duration::from_millis(5));
    }
}
