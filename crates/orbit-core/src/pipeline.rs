//! Process output → status line.
//!
//! [`ActivityPipeline`] owns the normalizer, matcher and arbiter, debounces
//! `pty` signals and exposes the same `poll`/`next_deadline` pair as the
//! arbiter. [`run_status_loop`] drives it from a channel.

use std::time::Duration;

use orbit_types::{ActivitySignal, ProcessEvent, ProcessEventKind, Source, StatusChange};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::Result;
use crate::arbiter::{ArbiterConfig, StatusArbiter};
use crate::clock::{Clock, SystemClock, Timer, earliest};
use crate::matcher::{ActivityPatternMatcher, GENERIC_LABEL, MatcherConfig, RuleKind};
use crate::normalizer::{ActivityTextNormalizer, DEFAULT_BUFFER_MAX_CHARS};

/// Normalizer and matcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub buffer_max_chars: usize,
    #[serde(flatten)]
    pub matcher: MatcherConfig,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            buffer_max_chars: DEFAULT_BUFFER_MAX_CHARS,
            matcher: MatcherConfig::default(),
        }
    }
}

/// Input to the status loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityInput {
    /// Output of the watched process.
    Process(ProcessEvent),
    /// A signal from an external reporter (tool server, voice pipeline).
    Report(ActivitySignal),
    /// Clear the display, honouring the hold window.
    Clear,
}

impl From<ProcessEvent> for ActivityInput {
    fn from(event: ProcessEvent) -> Self {
        ActivityInput::Process(event)
    }
}

impl From<ActivitySignal> for ActivityInput {
    fn from(signal: ActivitySignal) -> Self {
        ActivityInput::Report(signal)
    }
}

/// Consumer of status changes.
pub trait DisplaySink {
    fn show(&mut self, change: &StatusChange);
}

impl<F: FnMut(&StatusChange)> DisplaySink for F {
    fn show(&mut self, change: &StatusChange) {
        self(change)
    }
}

impl DisplaySink for Vec<StatusChange> {
    fn show(&mut self, change: &StatusChange) {
        self.push(change.clone());
    }
}

#[derive(Debug)]
pub struct ActivityPipeline<C: Clock = SystemClock> {
    normalizer: ActivityTextNormalizer,
    matcher: ActivityPatternMatcher,
    arbiter: StatusArbiter<C>,
    debounce: Timer,
    pending: Option<ActivitySignal>,
}

impl ActivityPipeline<SystemClock> {
    /// Pipeline on the tokio clock with default settings.
    pub fn with_defaults() -> Self {
        Self {
            normalizer: ActivityTextNormalizer::default(),
            matcher: ActivityPatternMatcher::default(),
            arbiter: StatusArbiter::new(SystemClock::new(), ArbiterConfig::default()),
            debounce: Timer::default(),
            pending: None,
        }
    }
}

impl<C: Clock> ActivityPipeline<C> {
    pub fn new(clock: C, activity: ActivityConfig, arbiter: ArbiterConfig) -> Result<Self> {
        Ok(Self {
            normalizer: ActivityTextNormalizer::new(activity.buffer_max_chars),
            matcher: ActivityPatternMatcher::new(activity.matcher)?,
            arbiter: StatusArbiter::new(clock, arbiter),
            debounce: Timer::default(),
            pending: None,
        })
    }

    pub fn arbiter(&self) -> &StatusArbiter<C> {
        &self.arbiter
    }

    /// Signal waiting out the debounce window, if any.
    pub fn pending(&self) -> Option<&ActivitySignal> {
        self.pending.as_ref()
    }

    pub fn now_ms(&self) -> u64 {
        self.arbiter.now_ms()
    }

    pub fn handle_input(&mut self, input: ActivityInput) -> Vec<StatusChange> {
        match input {
            ActivityInput::Process(event) => self.handle_event(&event),
            ActivityInput::Report(signal) => self.report(signal).into_iter().collect(),
            ActivityInput::Clear => self.clear().into_iter().collect(),
        }
    }

    pub fn handle_event(&mut self, event: &ProcessEvent) -> Vec<StatusChange> {
        match event.kind {
            ProcessEventKind::Start => {
                debug!(target: "orbit::pipeline", "Process started");
                self.restart()
            }
            ProcessEventKind::Stdout => self.handle_output(&event.text),
            ProcessEventKind::Stderr => {
                trace!(target: "orbit::pipeline", "stderr: {:?}", event.text);
                Vec::new()
            }
            ProcessEventKind::Exit => {
                debug!(target: "orbit::pipeline", "Process exited ({})", event.text);
                self.restart()
            }
        }
    }

    /// Offer an externally reported signal straight to the arbiter.
    pub fn report(&mut self, signal: ActivitySignal) -> Option<StatusChange> {
        trace!(target: "orbit::pipeline", "Report from {}: {:?}", signal.source, signal.text);
        self.arbiter.offer(&signal).change()
    }

    pub fn clear(&mut self) -> Option<StatusChange> {
        self.arbiter.clear()
    }

    /// Fire the debounce timer, then the arbiter's timers.
    pub fn poll(&mut self) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        if self.debounce.fire_if_due(self.arbiter.now_ms()) {
            if let Some(signal) = self.pending.take() {
                if is_generic(&signal) && self.showing_specific() {
                    trace!(target: "orbit::pipeline", "Dropped generic status");
                } else if let Some(change) = self.arbiter.offer(&signal).change() {
                    changes.push(change);
                }
            }
        }
        changes.extend(self.arbiter.poll());
        changes
    }

    pub fn next_deadline(&self) -> Option<u64> {
        earliest([self.debounce.deadline(), self.arbiter.next_deadline()])
    }

    fn handle_output(&mut self, fragment: &str) -> Vec<StatusChange> {
        let normalized = self.normalizer.feed(fragment);
        let Some(found) = self.matcher.classify(&normalized, fragment) else {
            return Vec::new();
        };
        if found.rule.clears_buffer() {
            self.normalizer.clear();
        }

        if found.rule.is_forced_clear() {
            return self.reset_terminal_status();
        }

        if found.rule == RuleKind::Generic && (self.showing_specific() || self.specific_pending()) {
            trace!(target: "orbit::pipeline", "Generic output while a specific status is up");
            return Vec::new();
        }

        self.submit(found.signal)
    }

    fn submit(&mut self, signal: ActivitySignal) -> Vec<StatusChange> {
        let debounce_ms = self.arbiter.config().debounce_ms;
        if signal.source == Source::Pty && debounce_ms > 0 {
            // The window opens with the first pending signal; later ones only
            // replace it, so steady output still reaches the arbiter.
            if !self.debounce.is_armed() {
                self.debounce.arm(self.arbiter.now_ms() + debounce_ms);
            }
            self.pending = Some(signal);
            return Vec::new();
        }
        self.arbiter.offer(&signal).change().into_iter().collect()
    }

    fn restart(&mut self) -> Vec<StatusChange> {
        self.normalizer.reset();
        self.reset_terminal_status()
    }

    /// Drop pending terminal output and force-clear a terminal status.
    /// Statuses from higher sources are left to their own reporters.
    fn reset_terminal_status(&mut self) -> Vec<StatusChange> {
        self.cancel_debounce();
        let source = self.arbiter.state().source;
        if source > Source::Pty {
            debug!(target: "orbit::pipeline", "Keeping {} status across terminal reset", source);
            return Vec::new();
        }
        self.arbiter.force_clear().into_iter().collect()
    }

    fn cancel_debounce(&mut self) {
        self.debounce.cancel();
        self.pending = None;
    }

    fn showing_specific(&self) -> bool {
        let state = self.arbiter.state();
        !state.is_idle() && state.displayed_text != GENERIC_LABEL
    }

    fn specific_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|signal| !is_generic(signal))
    }
}

fn is_generic(signal: &ActivitySignal) -> bool {
    signal.source == Source::Pty && signal.text == GENERIC_LABEL
}

/// Drive `pipeline` from `inputs` until the channel closes, pushing every
/// status change to `sink`.
pub async fn run_status_loop<C, S>(
    mut pipeline: ActivityPipeline<C>,
    mut inputs: mpsc::Receiver<ActivityInput>,
    sink: &mut S,
) where
    C: Clock,
    S: DisplaySink + ?Sized,
{
    debug!(target: "orbit::pipeline", "Status loop started");
    loop {
        let wait = pipeline
            .next_deadline()
            .map(|at| Duration::from_millis(at.saturating_sub(pipeline.now_ms())));

        tokio::select! {
            input = inputs.recv() => match input {
                Some(input) => {
                    for change in pipeline.handle_input(input) {
                        sink.show(&change);
                    }
                }
                None => break,
            },
            _ = sleep_for(wait) => {
                for change in pipeline.poll() {
                    sink.show(&change);
                }
            }
        }
    }
    debug!(target: "orbit::pipeline", "Status loop finished");
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}
