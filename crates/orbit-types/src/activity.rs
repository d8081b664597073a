//! Activity status types: signal sources, classified signals and the
//! changes pushed to the display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of an activity signal.
///
/// Variants are declared in priority order, so the derived `Ord` is the
/// arbitration order: `Idle < Pty < Mcp < Voice`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Nothing is happening.
    #[default]
    Idle,
    /// Parsed from a child process terminal.
    Pty,
    /// Reported by the tool server.
    Mcp,
    /// Voice pipeline (listening, speaking).
    Voice,
}

impl Source {
    /// Numeric priority (0..=3).
    pub fn priority(self) -> u8 {
        match self {
            Source::Idle => 0,
            Source::Pty => 1,
            Source::Mcp => 2,
            Source::Voice => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Idle => "idle",
            Source::Pty => "pty",
            Source::Mcp => "mcp",
            Source::Voice => "voice",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySignal {
    /// Text to display.
    pub text: String,
    /// Whether the "busy" animation should run.
    pub active: bool,
    /// Clear automatically after this many milliseconds (0 = never).
    pub auto_clear_ms: u64,
    pub source: Source,
}

impl ActivitySignal {
    pub fn new(text: impl Into<String>, source: Source) -> Self {
        Self {
            text: text.into(),
            active: true,
            auto_clear_ms: 0,
            source,
        }
    }

    pub fn auto_clear(mut self, ms: u64) -> Self {
        self.auto_clear_ms = ms;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The signal that represents "nothing to show".
    pub fn idle() -> Self {
        Self {
            text: String::new(),
            active: false,
            auto_clear_ms: 0,
            source: Source::Idle,
        }
    }
}

/// A visible status transition, consumed by the display sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub text: String,
    pub active: bool,
    pub source: Source,
}

impl StatusChange {
    pub fn idle() -> Self {
        Self {
            text: String::new(),
            active: false,
            source: Source::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.source == Source::Idle && self.text.is_empty()
    }
}

impl From<&ActivitySignal> for StatusChange {
    fn from(signal: &ActivitySignal) -> Self {
        Self {
            text: signal.text.clone(),
            active: signal.active,
            source: signal.source,
        }
    }
}
