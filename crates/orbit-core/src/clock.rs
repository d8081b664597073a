//! Injectable time source and deadline timers.
//!
//! Components never sleep or spawn timers themselves. They record deadlines
//! (milliseconds on an injected [`Clock`]) and fire them from `poll()`, which
//! keeps every timer cancellable and lets tests advance virtual time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync {
    /// Milliseconds since the clock's origin. Never decreases.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `tokio::time::Instant`, so paused tokio time in
/// tests also pauses this clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(ms: u64) -> Self {
        let clock = Self::new();
        clock.set(ms);
        clock
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A single cancellable deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<u64>,
}

impl Timer {
    /// Arm (or re-arm) the timer. Any previous deadline is replaced.
    pub fn arm(&mut self, at_ms: u64) {
        self.deadline = Some(at_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm and return true if the deadline has been reached.
    pub fn fire_if_due(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(at) if now_ms >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<u64>>) -> Option<u64> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(250);
        assert_eq!(other.now_ms(), 250);
        other.set(100);
        assert_eq!(clock.now_ms(), 250, "clock must not go backwards");
    }

    #[test]
    fn test_timer_fires_once() {
        let mut timer = Timer::default();
        timer.arm(1000);
        assert!(!timer.fire_if_due(999));
        assert!(timer.fire_if_due(1000));
        assert!(!timer.fire_if_due(5000));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let mut timer = Timer::default();
        timer.arm(300);
        timer.arm(600);
        assert!(!timer.fire_if_due(300));
        assert!(timer.fire_if_due(600));
    }

    #[test]
    fn test_earliest() {
        assert_eq!(earliest([None, Some(40), Some(10)]), Some(10));
        assert_eq!(earliest([None, None]), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_paused_time() {
        let clock = SystemClock::new();
        tokio::time::advance(std::time::Duration::from_millis(1500)).await;
        assert_eq!(clock.now_ms(), 1500);
    }
}
