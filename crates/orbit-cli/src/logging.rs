//! Logging configuration and initialization.
//!
//! Presets pick a base level per `orbit::` target; `--log target=level`
//! overrides individual targets and `RUST_LOG` replaces everything.

use std::collections::BTreeMap;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Logging preset levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Startup, process lifecycle and tool failures
    #[default]
    Production,
    /// Adds tool execution and status changes
    Verbose,
    /// Everything except per-rule matching
    Debug,
    /// Everything, including every chunk and rejected candidate
    Trace,
    /// Warnings and errors only
    Quiet,
}

/// Logging configuration built from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Per-target level overrides (e.g. "orbit::arbiter" -> TRACE)
    pub overrides: BTreeMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        // "arbiter=trace" or "orbit::activity::rules=debug", comma separated
        let mut overrides = BTreeMap::new();
        for override_str in log_overrides {
            for part in override_str.split(',') {
                let Some((target, level_str)) = part.split_once('=') else {
                    continue;
                };
                let target = target.trim();
                let full_target = if target == "orbit" || target.starts_with("orbit::") {
                    target.to_string()
                } else {
                    format!("orbit::{}", target)
                };
                if let Some(level) = parse_level(level_str.trim()) {
                    overrides.insert(full_target, level);
                }
            }
        }

        Self {
            preset,
            overrides,
            format,
        }
    }

    /// Directives for the preset plus overrides, in filter syntax.
    pub fn directives(&self) -> String {
        let mut directives: Vec<String> = match self.preset {
            LogPreset::Production => vec![
                "orbit::startup=info".into(),
                "orbit::process=info".into(),
                "orbit::tools=warn".into(),
                "orbit::pipeline=warn".into(),
                "orbit::arbiter=warn".into(),
                "orbit::activity=warn".into(),
                "orbit::activity::rules=off".into(),
            ],
            LogPreset::Verbose => vec![
                "orbit=info".into(),
                "orbit::arbiter=debug".into(),
                "orbit::activity::rules=off".into(),
            ],
            LogPreset::Debug => vec!["orbit=debug".into(), "orbit::activity::rules=off".into()],
            LogPreset::Trace => vec!["orbit=trace".into()],
            LogPreset::Quiet => vec!["orbit=warn".into()],
        };

        for (target, level) in &self.overrides {
            directives.push(format!("{}={}", target, level_to_str(*level)));
        }
        directives.join(",")
    }

    /// Build an EnvFilter, preferring `RUST_LOG` when it is set.
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn level_to_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Initialize the tracing subscriber. Logs go to stderr so stdout stays
/// clean for command output.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}
