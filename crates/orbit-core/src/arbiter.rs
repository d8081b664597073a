//! Single-line status arbitration.
//!
//! Candidates from every source compete for one display line. Priority is
//! `idle < pty < mcp < voice`. After a status is accepted it is held for
//! `hold_ms` so rapid output doesn't flicker; only a higher source or
//! `voice` may replace it early. A forced clear ignores the hold.

use orbit_types::{ActivitySignal, Source, StatusChange};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock, Timer, earliest};

pub const DEFAULT_HOLD_MS: u64 = 1_200;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Minimum time an accepted status stays on screen.
    pub hold_ms: u64,
    /// Coalescing window for `pty` signals, applied by the pipeline.
    pub debounce_ms: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            hold_ms: DEFAULT_HOLD_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// What is on screen right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbiterState {
    pub displayed_text: String,
    pub active: bool,
    pub source: Source,
    /// Clock time before which equal or lower sources are turned away.
    pub hold_until: u64,
}

impl ArbiterState {
    pub fn priority(&self) -> u8 {
        self.source.priority()
    }

    pub fn is_idle(&self) -> bool {
        self.source == Source::Idle && self.displayed_text.is_empty()
    }

    fn change(&self) -> StatusChange {
        StatusChange {
            text: self.displayed_text.clone(),
            active: self.active,
            source: self.source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A higher source is showing.
    LowerPriority,
    /// The current status is still inside its hold window.
    HoldWindow,
}

/// Outcome of [`StatusArbiter::offer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer {
    Accepted(StatusChange),
    /// Same status already showing; only its auto-clear was refreshed.
    Refreshed,
    Rejected(Rejection),
}

impl Offer {
    pub fn change(self) -> Option<StatusChange> {
        match self {
            Offer::Accepted(change) => Some(change),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct StatusArbiter<C: Clock = SystemClock> {
    clock: C,
    config: ArbiterConfig,
    state: ArbiterState,
    auto_clear: Timer,
    deferred_clear: Timer,
}

impl<C: Clock> StatusArbiter<C> {
    pub fn new(clock: C, config: ArbiterConfig) -> Self {
        Self {
            clock,
            config,
            state: ArbiterState::default(),
            auto_clear: Timer::default(),
            deferred_clear: Timer::default(),
        }
    }

    pub fn state(&self) -> &ArbiterState {
        &self.state
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Offer a candidate status.
    pub fn offer(&mut self, signal: &ActivitySignal) -> Offer {
        let now = self.clock.now_ms();
        let priority = signal.source.priority();
        let current = &self.state;

        if current.source != Source::Idle && priority < current.priority() {
            trace!(
                target: "orbit::arbiter",
                "Rejected {:?} from {}: {} is showing",
                signal.text,
                signal.source,
                current.source
            );
            return Offer::Rejected(Rejection::LowerPriority);
        }

        if signal.text == current.displayed_text && signal.source == current.source {
            if signal.auto_clear_ms > 0 {
                self.auto_clear.arm(now + signal.auto_clear_ms);
            }
            return Offer::Refreshed;
        }

        if now < current.hold_until && signal.source != Source::Voice && priority <= current.priority() {
            trace!(
                target: "orbit::arbiter",
                "Rejected {:?}: held for another {} ms",
                signal.text,
                current.hold_until - now
            );
            return Offer::Rejected(Rejection::HoldWindow);
        }

        self.state = ArbiterState {
            displayed_text: signal.text.clone(),
            active: signal.active,
            source: signal.source,
            hold_until: self.state.hold_until.max(now + self.config.hold_ms),
        };
        if signal.auto_clear_ms > 0 {
            self.auto_clear.arm(now + signal.auto_clear_ms);
        } else {
            self.auto_clear.cancel();
        }
        self.deferred_clear.cancel();

        debug!(
            target: "orbit::arbiter",
            "Showing {:?} from {} (auto-clear {} ms)",
            signal.text,
            signal.source,
            signal.auto_clear_ms
        );
        Offer::Accepted(self.state.change())
    }

    /// Clear to idle, waiting for the hold window if it hasn't elapsed.
    ///
    /// Returns the change when the display was cleared right away.
    pub fn clear(&mut self) -> Option<StatusChange> {
        let now = self.clock.now_ms();
        self.auto_clear.cancel();

        if self.state.is_idle() {
            self.deferred_clear.cancel();
            return None;
        }
        if now < self.state.hold_until {
            trace!(
                target: "orbit::arbiter",
                "Clear deferred until {} ms",
                self.state.hold_until
            );
            self.deferred_clear.arm(self.state.hold_until);
            return None;
        }
        Some(self.clear_now())
    }

    /// Cancel every timer, drop the hold window and clear immediately.
    pub fn force_clear(&mut self) -> Option<StatusChange> {
        self.auto_clear.cancel();
        self.deferred_clear.cancel();
        self.state.hold_until = 0;

        if self.state.is_idle() {
            return None;
        }
        debug!(target: "orbit::arbiter", "Forced clear of {:?}", self.state.displayed_text);
        Some(self.clear_now())
    }

    /// Fire any due timers.
    pub fn poll(&mut self) -> Option<StatusChange> {
        let now = self.clock.now_ms();
        if self.deferred_clear.fire_if_due(now) {
            return self.clear();
        }
        if self.auto_clear.fire_if_due(now) {
            trace!(target: "orbit::arbiter", "Auto-clear of {:?}", self.state.displayed_text);
            return self.clear();
        }
        None
    }

    /// Earliest armed timer, in clock milliseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        earliest([self.auto_clear.deadline(), self.deferred_clear.deadline()])
    }

    fn clear_now(&mut self) -> StatusChange {
        self.auto_clear.cancel();
        self.deferred_clear.cancel();
        self.state = ArbiterState {
            hold_until: self.state.hold_until,
            ..ArbiterState::default()
        };
        StatusChange::idle()
    }
}
