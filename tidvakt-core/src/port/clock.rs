//! ## tidvakt-core::port::clock
//! **Millisecond tick sources**
//!
//! Ticks are `u32` milliseconds that wrap at the full width of the type.
//! Consumers must compute elapsed time with `wrapping_sub`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic, non-decreasing millisecond counter.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u32;
}

/// Milliseconds elapsed since construction, truncated to 32 bits.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound.
        self.epoch.elapsed().as_millis() as u32
    }
}

/// Manually advanced clock for deterministic runs.
///
/// Clones share the same counter, so a test can keep one handle while the
/// bus or state machine holds another.
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    ticks: Arc<AtomicU32>,
}

impl VirtualClock {
    /// Creates a clock starting at `seed` milliseconds.
    pub fn new(seed: u32) -> Self {
        Self {
            ticks: Arc::new(AtomicU32::new(seed)),
        }
    }

    /// Advances the clock, wrapping at `u32::MAX`.
    #[inline]
    pub fn advance(&self, ms: u32) {
        self.ticks.fetch_add(ms, Ordering::Release);
    }

    #[inline]
    pub fn set(&self, ms: u32) {
        self.ticks.store(ms, Ordering::Release);
    }
}

impl Clock for VirtualClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }
}
