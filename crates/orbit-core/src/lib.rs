//! Tool-call extraction and execution, and the streamed activity-status
//! arbiter for Orbit.

mod arbiter;
mod clock;
mod error;
mod executor;
mod matcher;
mod normalizer;
mod pipeline;
mod registry;
mod tool_parser;

pub use arbiter::{
    ArbiterConfig, ArbiterState, DEFAULT_DEBOUNCE_MS, DEFAULT_HOLD_MS, Offer, Rejection,
    StatusArbiter,
};
pub use clock::{Clock, ManualClock, SystemClock, Timer};
pub use error::OrbitError;
pub use executor::{
    BROWSER_TIMEOUT_MS, DEFAULT_TIMEOUT_MS, ExecutorConfig, MAX_ERROR_CHARS, MAX_RESULT_CHARS,
    TRUNCATION_MARKER, ToolExecutor, ToolInvocation, format_tool_result, truncate_text,
};
pub use matcher::{
    ActivityPatternMatcher, AutoClearDurations, Classification, GENERIC_LABEL, MatcherConfig,
    RuleKind, is_metrics_output,
};
pub use normalizer::{ActivityTextNormalizer, DEFAULT_BUFFER_MAX_CHARS, strip_escapes};
pub use pipeline::{ActivityConfig, ActivityInput, ActivityPipeline, DisplaySink, run_status_loop};
pub use registry::{
    FnTool, ParamKind, ParamSpec, ToolCategory, ToolError, ToolHandler, ToolOutput, ToolRegistry,
    ToolRegistryBuilder, ToolSpec,
};
pub use tool_parser::ToolCallParser;

/// Result type for Orbit operations.
pub type Result<T> = std::result::Result<T, OrbitError>;
