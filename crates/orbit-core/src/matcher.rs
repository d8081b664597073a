//! Ordered rule table that turns normalized terminal text into activity
//! signals.
//!
//! Rules are evaluated in [`RuleKind::ORDER`] and the first match wins. Every
//! rule except [`RuleKind::Generic`] is confident, meaning the caller should
//! drop the text it has buffered so far.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use orbit_types::{ActivitySignal, Source};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::normalizer::strip_escapes;
use crate::{OrbitError, Result};

pub const GENERIC_LABEL: &str = "Working...";

/// MCP tool marker: "● server - tool_name (MCP)".
static MCP_TOOL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[●•⏺*\-]\s*([A-Za-z0-9_.\-]+)\s+-\s+([A-Za-z0-9_.\-]+)\s*\(MCP\)")
        .expect("Invalid MCP tool regex")
});

/// Built-in agent tool invocation: "● Read(src/main.rs)".
static BUILTIN_TOOL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(Read|Write|Edit|MultiEdit|Update|Bash|Grep|Glob|Search|List|WebFetch|WebSearch|Task|TodoWrite|NotebookEdit)\s*\(",
    )
    .expect("Invalid built-in tool regex")
});

static FOUND_RESULTS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfound\s+(\d+)\s+(results?|files?|matches?)\b").expect("Invalid found regex")
});

/// A lone `>` on its own line, or an agent prompt glyph, at the end of the text.
static PROMPT_RETURN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?:^|\n)[ \t]*>|[❯›])[ \t\u{a0}]*[\r\n]*\z").expect("Invalid prompt regex")
});

/// Model/cost/token/context status lines, e.g. "Opus 4.5 | $0.68 | 29.2K/22.5K | ctx:11%".
static METRICS_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:[A-Za-z][A-Za-z0-9.\- ]*\s*\|\s*\$[0-9.]+",
        r"|[0-9.]+K/[0-9.]+K",
        r"|ctx:\s*\d+%)",
    ))
    .expect("Invalid metrics line regex")
});

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    McpTool,
    BuiltinTool,
    SearchResults,
    Keyword,
    Sentinel,
    PromptReturn,
    Generic,
}

impl RuleKind {
    /// Evaluation order.
    pub const ORDER: [RuleKind; 7] = [
        RuleKind::McpTool,
        RuleKind::BuiltinTool,
        RuleKind::SearchResults,
        RuleKind::Keyword,
        RuleKind::Sentinel,
        RuleKind::PromptReturn,
        RuleKind::Generic,
    ];

    pub fn clears_buffer(self) -> bool {
        self != RuleKind::Generic
    }

    /// Prompt return clears the display immediately, ignoring the hold window.
    pub fn is_forced_clear(self) -> bool {
        self == RuleKind::PromptReturn
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::McpTool => "mcp_tool",
            RuleKind::BuiltinTool => "builtin_tool",
            RuleKind::SearchResults => "search_results",
            RuleKind::Keyword => "keyword",
            RuleKind::Sentinel => "sentinel",
            RuleKind::PromptReturn => "prompt_return",
            RuleKind::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub rule: RuleKind,
    pub signal: ActivitySignal,
}

/// Auto-clear durations per rule, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoClearDurations {
    pub mcp_tool_ms: u64,
    pub builtin_tool_ms: u64,
    pub search_results_ms: u64,
    pub thinking_ms: u64,
    pub running_ms: u64,
    pub message_sent_ms: u64,
    pub voice_listening_ms: u64,
    pub generic_ms: u64,
}

impl Default for AutoClearDurations {
    fn default() -> Self {
        Self {
            mcp_tool_ms: 15_000,
            builtin_tool_ms: 10_000,
            search_results_ms: 3_000,
            thinking_ms: 15_000,
            running_ms: 10_000,
            message_sent_ms: 3_000,
            voice_listening_ms: 600_000,
            generic_ms: 4_000,
        }
    }
}

/// Tunable vocabulary and durations for the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum size of a single fragment before it earns "Working...".
    #[serde(default = "default_generic_min_chars")]
    pub generic_min_chars: usize,
    pub thinking_keywords: Vec<String>,
    pub running_keywords: Vec<String>,
    /// MCP tool name to display label.
    pub tool_labels: BTreeMap<String, String>,
    /// Additional regexes treated as a prompt return.
    pub extra_prompt_patterns: Vec<String>,
    pub auto_clear: AutoClearDurations,
}

fn default_generic_min_chars() -> usize {
    40
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            generic_min_chars: default_generic_min_chars(),
            thinking_keywords: words(&[
                "thinking",
                "pondering",
                "reasoning",
                "planning",
                "considering",
                "reflecting",
                "analyzing",
                "contemplating",
                "deliberating",
                "mulling",
                "ruminating",
                "actualizing",
                "mustering",
            ]),
            running_keywords: words(&[
                "running",
                "executing",
                "compiling",
                "building",
                "installing",
                "downloading",
                "fetching",
                "testing",
                "processing",
                "generating",
            ]),
            tool_labels: BTreeMap::new(),
            extra_prompt_patterns: Vec::new(),
            auto_clear: AutoClearDurations::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityPatternMatcher {
    config: MatcherConfig,
    thinking: Vec<String>,
    running: Vec<String>,
    extra_prompts: Vec<Regex>,
}

impl Default for ActivityPatternMatcher {
    fn default() -> Self {
        let config = MatcherConfig::default();
        Self {
            thinking: config.thinking_keywords.clone(),
            running: config.running_keywords.clone(),
            extra_prompts: Vec::new(),
            config,
        }
    }
}

impl ActivityPatternMatcher {
    /// Build a matcher, compiling any extra prompt patterns.
    pub fn new(config: MatcherConfig) -> Result<Self> {
        let extra_prompts = config
            .extra_prompt_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| OrbitError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let lower = |list: &[String]| -> Vec<String> {
            list.iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };

        Ok(Self {
            thinking: lower(&config.thinking_keywords),
            running: lower(&config.running_keywords),
            extra_prompts,
            config,
        })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Classify `normalized` (the stripped rolling buffer). `fragment` is the
    /// raw chunk that was just fed and only sizes the generic fallback.
    pub fn classify(&self, normalized: &str, fragment: &str) -> Option<Classification> {
        let found = RuleKind::ORDER
            .iter()
            .find_map(|&rule| self.apply(rule, normalized, fragment));
        if let Some(found) = &found {
            trace!(
                target: "orbit::activity::rules",
                "Rule {} matched: {:?}",
                found.rule.as_str(),
                found.signal.text
            );
        }
        found
    }

    /// Evaluate a single rule.
    pub fn apply(&self, rule: RuleKind, normalized: &str, fragment: &str) -> Option<Classification> {
        let signal = match rule {
            RuleKind::McpTool => self.mcp_tool(normalized),
            RuleKind::BuiltinTool => self.builtin_tool(normalized),
            RuleKind::SearchResults => self.search_results(normalized),
            RuleKind::Keyword => self.keyword(normalized),
            RuleKind::Sentinel => self.sentinel(normalized),
            RuleKind::PromptReturn => self.prompt_return(normalized),
            RuleKind::Generic => self.generic(fragment),
        }?;
        Some(Classification { rule, signal })
    }

    fn pty(&self, text: impl Into<String>, auto_clear_ms: u64) -> ActivitySignal {
        ActivitySignal::new(text, Source::Pty).auto_clear(auto_clear_ms)
    }

    fn mcp_tool(&self, text: &str) -> Option<ActivitySignal> {
        let caps = MCP_TOOL_REGEX.captures(text)?;
        let tool = caps.get(2)?.as_str();
        let label = match self.config.tool_labels.get(tool) {
            Some(label) => label.clone(),
            None => format!("Running {}", tool.replace('_', " ")),
        };
        Some(self.pty(label, self.config.auto_clear.mcp_tool_ms))
    }

    fn builtin_tool(&self, text: &str) -> Option<ActivitySignal> {
        let caps = BUILTIN_TOOL_REGEX.captures(text)?;
        let label = match caps.get(1)?.as_str() {
            "Read" => "Reading file",
            "Write" => "Writing file",
            "Edit" | "MultiEdit" | "Update" => "Editing file",
            "Bash" => "Running command",
            "Grep" | "Search" => "Searching",
            "Glob" => "Finding files",
            "List" => "Listing files",
            "WebFetch" => "Fetching web page",
            "WebSearch" => "Searching the web",
            "Task" => "Running task",
            "TodoWrite" => "Updating todos",
            "NotebookEdit" => "Editing notebook",
            _ => return None,
        };
        Some(self.pty(label, self.config.auto_clear.builtin_tool_ms))
    }

    fn search_results(&self, text: &str) -> Option<ActivitySignal> {
        let caps = FOUND_RESULTS_REGEX.captures(text)?;
        let count = caps.get(1)?.as_str();
        let noun = caps.get(2)?.as_str().to_lowercase();
        Some(
            self.pty(
                format!("Found {} {}", count, noun),
                self.config.auto_clear.search_results_ms,
            )
            .inactive(),
        )
    }

    fn keyword(&self, text: &str) -> Option<ActivitySignal> {
        let lower = text.to_lowercase();
        let durations = &self.config.auto_clear;
        self.thinking
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(|k| (k, durations.thinking_ms))
            .or_else(|| {
                self.running
                    .iter()
                    .find(|k| lower.contains(k.as_str()))
                    .map(|k| (k, durations.running_ms))
            })
            .map(|(keyword, ms)| self.pty(format!("{}...", capitalize(keyword)), ms))
    }

    fn sentinel(&self, text: &str) -> Option<ActivitySignal> {
        let lower = text.to_lowercase();
        let durations = &self.config.auto_clear;
        if lower.contains("message sent") {
            Some(self.pty("Message sent", durations.message_sent_ms).inactive())
        } else if lower.contains("listening for voice") {
            Some(self.pty("Listening for voice...", durations.voice_listening_ms))
        } else {
            None
        }
    }

    fn prompt_return(&self, text: &str) -> Option<ActivitySignal> {
        let matched = PROMPT_RETURN_REGEX.is_match(text)
            || self.extra_prompts.iter().any(|re| re.is_match(text));
        matched.then(ActivitySignal::idle)
    }

    fn generic(&self, fragment: &str) -> Option<ActivitySignal> {
        let stripped = strip_escapes(fragment);
        let visible = stripped.trim();
        if visible.chars().count() < self.config.generic_min_chars || is_metrics_output(visible) {
            return None;
        }
        Some(self.pty(GENERIC_LABEL, self.config.auto_clear.generic_ms))
    }
}

/// True when every non-blank line is a status/metrics line or has no
/// letters at all (spinners, progress bars, separators).
pub fn is_metrics_output(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .all(|line| METRICS_LINE_REGEX.is_match(line) || !line.chars().any(char::is_alphabetic))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
