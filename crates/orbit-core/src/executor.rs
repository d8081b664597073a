//! Tool execution with argument validation, timeouts and result formatting.
//!
//! [`ToolExecutor::execute`] always produces a [`ToolResult`]: unknown tools,
//! invalid arguments, handler errors, handler panics and timeouts all come
//! back as `success: false` with a message for the model.

use std::any::Any;
use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use orbit_types::{FormattedToolOutput, ToolArgs, ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::registry::{ToolCategory, ToolRegistry, ToolSpec};
use crate::tool_parser::ToolCallParser;

/// Timeout for tools that don't declare a category needing more.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Browser tools launch an external process and get twice as long.
pub const BROWSER_TIMEOUT_MS: u64 = 60_000;

/// Longest success payload fed back into the conversation.
pub const MAX_RESULT_CHARS: usize = 12_000;

/// Longest error message fed back into the conversation.
pub const MAX_ERROR_CHARS: usize = 400;

pub const TRUNCATION_MARKER: &str = "…(truncated)…";

/// Executor limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub default_timeout_ms: u64,
    pub browser_timeout_ms: u64,
    pub max_result_chars: usize,
    pub max_error_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            browser_timeout_ms: BROWSER_TIMEOUT_MS,
            max_result_chars: MAX_RESULT_CHARS,
            max_error_chars: MAX_ERROR_CHARS,
        }
    }
}

/// Everything produced by one pass through the tool pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call: ToolCall,
    pub result: ToolResult,
    pub output: FormattedToolOutput,
}

/// Runs registered tools.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    parser: ToolCallParser,
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self::with_config(registry, ExecutorConfig::default())
    }

    pub fn with_config(registry: ToolRegistry, config: ExecutorConfig) -> Self {
        let parser = registry.parser();
        Self {
            registry,
            parser,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Parser that accepts exactly the registered tools.
    pub fn parser(&self) -> &ToolCallParser {
        &self.parser
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Timeout applied when the caller passes none.
    pub fn timeout_for(&self, spec: &ToolSpec) -> Duration {
        let ms = match spec.category {
            ToolCategory::General => self.config.default_timeout_ms,
            ToolCategory::Browser => self.config.browser_timeout_ms,
        };
        Duration::from_millis(ms)
    }

    /// Validate `args` and run `name`, racing the handler against `timeout`.
    pub async fn execute(&self, name: &str, args: ToolArgs, timeout: Option<Duration>) -> ToolResult {
        let Some(handler) = self.registry.get(name) else {
            warn!(target: "orbit::tools", "No handler registered for {}", name);
            return ToolResult::failure(format!("Unknown tool: {}", name));
        };

        let spec = handler.spec();
        if let Err(reason) = spec.validate(&args) {
            info!(target: "orbit::tools", "Rejected {} call: {}", name, reason);
            return ToolResult::failure(format!("Invalid arguments for {}: {}", name, reason));
        }

        let limit = timeout.unwrap_or_else(|| self.timeout_for(spec));
        let started = tokio::time::Instant::now();
        debug!(target: "orbit::tools", "Executing {} (timeout {} ms)", name, limit.as_millis());

        let call = AssertUnwindSafe(handler.call(args)).catch_unwind();
        let result = match tokio::time::timeout(limit, call).await {
            Ok(Ok(Ok(output))) => ToolResult {
                success: true,
                result: Some(output.text),
                error: None,
                image_data_url: output.image_data_url,
            },
            Ok(Ok(Err(e))) => ToolResult::failure(e.to_string()),
            Ok(Err(panic)) => {
                warn!(target: "orbit::tools", "{} panicked: {}", name, panic_message(panic.as_ref()));
                ToolResult::failure(format!("{} crashed: {}", name, panic_message(panic.as_ref())))
            }
            Err(_) => {
                warn!(target: "orbit::tools", "{} timed out after {} ms", name, limit.as_millis());
                ToolResult::failure(format!("{} timed out after {} ms", name, limit.as_millis()))
            }
        };

        info!(
            target: "orbit::tools",
            "{} finished in {} ms (success={})",
            name,
            started.elapsed().as_millis(),
            result.success
        );
        result
    }

    /// Format with this executor's limits.
    pub fn format_result(&self, name: &str, result: &ToolResult) -> FormattedToolOutput {
        format_with_limits(
            name,
            result,
            self.config.max_result_chars,
            self.config.max_error_chars,
        )
    }

    /// Parse a model response and, if it holds a tool call, run it.
    ///
    /// A call naming an unknown tool is not executed; the parser's message is
    /// returned as the failure so the model can correct itself.
    /// `timeout` overrides the tool's category timeout, as in [`Self::execute`].
    pub async fn run_from_text(&self, text: &str, timeout: Option<Duration>) -> Option<ToolInvocation> {
        let call = self.parser.parse(text)?;
        let result = match &call.error {
            Some(error) => ToolResult::failure(error.clone()),
            None => self.execute(&call.tool, call.args.clone(), timeout).await,
        };
        let output = self.format_result(&call.tool, &result);
        Some(ToolInvocation {
            call,
            result,
            output,
        })
    }
}

/// Format a result for re-injection into the conversation using the
/// default limits.
pub fn format_tool_result(name: &str, result: &ToolResult) -> FormattedToolOutput {
    format_with_limits(name, result, MAX_RESULT_CHARS, MAX_ERROR_CHARS)
}

fn format_with_limits(
    name: &str,
    result: &ToolResult,
    max_result_chars: usize,
    max_error_chars: usize,
) -> FormattedToolOutput {
    if !result.success {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        return FormattedToolOutput::Text(format!(
            "{} failed: {}",
            name,
            truncate_text(reason, max_error_chars)
        ));
    }

    let body = match result.result.as_deref() {
        Some(text) if !text.is_empty() => truncate_text(text, max_result_chars),
        _ => Cow::Borrowed("(no output)"),
    };
    let text = format!("[{} result]\n{}", name, body);

    match &result.image_data_url {
        Some(image_data_url) => FormattedToolOutput::Vision {
            text,
            image_data_url: image_data_url.clone(),
        },
        None => FormattedToolOutput::Text(text),
    }
}

/// Cut `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`].
///
/// Text at or under the limit is returned unchanged.
pub fn truncate_text(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
