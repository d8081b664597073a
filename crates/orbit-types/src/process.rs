//! Events emitted by the child-process bridge.

use serde::{Deserialize, Serialize};

/// Kind of process-output event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessEventKind {
    /// Process was spawned.
    Start,
    /// Chunk of standard output (may contain ANSI escapes).
    Stdout,
    /// Chunk of standard error.
    Stderr,
    /// Process exited.
    Exit,
}

/// One discrete event from the process-output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEvent {
    #[serde(rename = "type")]
    pub kind: ProcessEventKind,
    #[serde(default)]
    pub text: String,
}

impl ProcessEvent {
    pub fn start() -> Self {
        Self {
            kind: ProcessEventKind::Start,
            text: String::new(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            kind: ProcessEventKind::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            kind: ProcessEventKind::Stderr,
            text: text.into(),
        }
    }

    pub fn exit(code: Option<i32>) -> Self {
        Self {
            kind: ProcessEventKind::Exit,
            text: code.map(|c| c.to_string()).unwrap_or_default(),
        }
    }
}
