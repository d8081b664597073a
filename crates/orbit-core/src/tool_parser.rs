//! Extraction of tool calls embedded in free-form model output.
//!
//! Local and cloud models both wrap tool payloads in prose and markdown
//! fences, and small quantized models regularly drop trailing braces. The
//! parser locates the payload, balances it with a string-aware brace scan and
//! closes any braces the model forgot. It never errors: anything it cannot
//! recover is logged and reported as "no tool call".

use std::borrow::Cow;
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use orbit_types::{ToolArgs, ToolCall};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Literal key that every tool payload must contain.
const TOOL_KEY: &str = "\"tool\"";

/// How far after a `{` the `"tool"` key may appear for that brace to be the
/// payload start.
const CANDIDATE_WINDOW_CHARS: usize = 150;

/// Opening and closing markdown fences, with an optional language tag.
static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+\-]*").expect("Invalid code fence regex"));

/// Parser for tool invocations in model output.
#[derive(Debug, Clone, Default)]
pub struct ToolCallParser {
    known_tools: BTreeSet<String>,
}

impl ToolCallParser {
    /// Create a parser that accepts the given tool names.
    pub fn new<I, S>(known_tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_tools: known_tools.into_iter().map(Into::into).collect(),
        }
    }

    /// Registered tool names, sorted.
    pub fn known_tools(&self) -> impl Iterator<Item = &str> {
        self.known_tools.iter().map(String::as_str)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known_tools.contains(name)
    }

    /// Extract the tool call from `text`, if there is one.
    ///
    /// Returns `None` when no payload is present or it cannot be parsed even
    /// after brace recovery. An unregistered tool name still yields a
    /// [`ToolCall`], with `error` describing the available tools.
    pub fn parse(&self, text: &str) -> Option<ToolCall> {
        if !text.contains(TOOL_KEY) {
            return None;
        }

        let cleaned = strip_code_fences(text);
        let found = candidate_starts(&cleaned).find_map(|start| {
            parse_candidate(&cleaned[start..])
                .map_err(|reason| {
                    debug!(target: "orbit::tools", "Skipping candidate at byte {}: {}", start, reason)
                })
                .ok()
        });
        let Some((tool, args)) = found else {
            info!(target: "orbit::tools", "Ignoring text with no parseable tool call payload");
            return None;
        };

        let mut call = ToolCall::new(tool, args);

        if !self.is_known(&call.tool) {
            info!(target: "orbit::tools", "Model requested unknown tool {:?}", call.tool);
            call.error = Some(self.unknown_tool_message(&call.tool));
        }

        Some(call)
    }

    /// Message relayed to the model when it names an unregistered tool.
    pub fn unknown_tool_message(&self, name: &str) -> String {
        let available = if self.known_tools.is_empty() {
            "(none)".to_string()
        } else {
            self.known_tools().collect::<Vec<_>>().join(", ")
        };
        format!("Unknown tool \"{}\". Available tools: {}", name, available)
    }
}

/// Remove markdown code-fence markers, keeping their contents.
fn strip_code_fences(text: &str) -> Cow<'_, str> {
    CODE_FENCE_RE.replace_all(text, "")
}

/// Byte offsets of every `{` followed by `"tool"` within the lookahead
/// window, in order.
fn candidate_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices('{')
        .map(|(i, _)| i)
        .filter(move |&i| char_window(&text[i..], CANDIDATE_WINDOW_CHARS).contains(TOOL_KEY))
}

/// Balance the object at offset 0 and read its tool name and arguments.
fn parse_candidate(text: &str) -> Result<(String, ToolArgs), String> {
    let candidate = balanced_object(text);
    let value: Value = serde_json::from_str(&candidate).map_err(|e| e.to_string())?;
    let Value::Object(mut object) = value else {
        return Err("not an object".to_string());
    };
    let tool = match object.remove("tool") {
        Some(Value::String(name)) => name.trim().to_string(),
        _ => return Err("no string \"tool\" field".to_string()),
    };
    let args = take_args(&mut object, &tool);
    Ok((tool, args))
}

/// The first `max_chars` characters of `text`.
fn char_window(text: &str, max_chars: usize) -> &str {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

/// Result of scanning for the brace that closes the object at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BraceScan {
    /// Byte offset just past the closing brace, if the object is complete.
    end: Option<usize>,
    /// Braces still open when the text ran out.
    unclosed: usize,
}

/// Depth scan that ignores braces inside JSON strings.
fn scan_braces(text: &str) -> BraceScan {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return BraceScan {
                        end: Some(i + 1),
                        unclosed: 0,
                    };
                }
            }
            _ => {}
        }
    }

    BraceScan {
        end: None,
        unclosed: depth,
    }
}

/// The object starting at offset 0, closed with exactly as many braces as
/// the text is missing.
fn balanced_object(text: &str) -> Cow<'_, str> {
    let scan = scan_braces(text);
    if let Some(end) = scan.end {
        return Cow::Borrowed(&text[..end]);
    }

    debug!(
        target: "orbit::tools",
        "Tool payload truncated, auto-closing {} brace(s)",
        scan.unclosed
    );
    let mut closed = text.trim_end().to_string();
    closed.extend(std::iter::repeat_n('}', scan.unclosed));
    Cow::Owned(closed)
}

/// Pull the argument object out of a payload.
///
/// Accepts `args` or `arguments`. Some models send the arguments as a JSON
/// string; that string is decoded when it holds an object.
fn take_args(object: &mut Map<String, Value>, tool: &str) -> ToolArgs {
    let raw = object.remove("args").or_else(|| object.remove("arguments"));
    match raw {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args,
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
            Ok(Value::Object(args)) => args,
            _ => {
                debug!(target: "orbit::tools", "Ignoring non-object string args for {}", tool);
                Map::new()
            }
        },
        Some(other) => {
            debug!(target: "orbit::tools", "Ignoring non-object args for {}: {}", tool, other);
            Map::new()
        }
    }
}
