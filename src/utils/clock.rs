//! Host clock.
//!
//! Sessions never read the system time directly. Two readings are needed: a
//! millisecond tick counter for outbound pacing and wall-clock seconds for the
//! keepalive. Tests drive a [`ManualClock`] instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since an arbitrary origin.
    fn ticks_ms(&self) -> u64;

    /// Wall-clock seconds.
    fn now_secs(&self) -> u64;
}

/// Clock backed by [`Instant`] and [`SystemTime`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ticks_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ticks_ms: u64) -> Self {
        let clock = Self::new();
        clock.set(ticks_ms);
        clock
    }

    pub fn advance(&self, ms: u64) {
        self.ticks_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ticks_ms: u64) {
        self.ticks_ms.store(ticks_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn ticks_ms(&self) -> u64 {
        self.ticks_ms.load(Ordering::SeqCst)
    }

    fn now_secs(&self) -> u64 {
        self.ticks_ms() / 1000
    }
}
