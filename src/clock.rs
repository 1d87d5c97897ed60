//! Monotonic clock abstraction for step scheduling.
//!
//! The motion sequencer paces multi-step moves against real elapsed time, not
//! just accumulated delays, so it needs a clock in addition to a
//! [`DelayNs`](embedded_hal::delay::DelayNs) provider.

use core::time::Duration;

/// Something which records elapsed real time.
///
/// Uses shared references because one clock may be shared between multiple
/// motors at any one time.
pub trait SystemClock {
    /// The amount of time that has passed since a clock-specific reference
    /// point (e.g. device startup).
    fn elapsed(&self) -> Duration;
}

impl<F> SystemClock for F
where
    F: Fn() -> Duration,
{
    fn elapsed(&self) -> Duration {
        self()
    }
}

/// A monotonically non-decreasing clock backed by the operating system.
#[cfg(feature = "std")]
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingSystemClock {
    created_at: std::time::Instant,
}

#[cfg(feature = "std")]
impl OperatingSystemClock {
    /// Create a clock whose reference point is the moment of creation.
    pub fn new() -> OperatingSystemClock {
        OperatingSystemClock::default()
    }
}

#[cfg(feature = "std")]
impl SystemClock for OperatingSystemClock {
    fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}

#[cfg(feature = "std")]
impl Default for OperatingSystemClock {
    fn default() -> OperatingSystemClock {
        OperatingSystemClock {
            created_at: std::time::Instant::now(),
        }
    }
}
