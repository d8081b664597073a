//! Error types for Orbit.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrbitError {
    #[error("Invalid tool name: {0:?}")]
    InvalidToolName(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid parameter spec for {tool}: {reason}")]
    InvalidParamSpec { tool: String, reason: String },

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
