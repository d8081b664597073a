//! Orbit configuration.

use anyhow::{Context, Result};
use orbit_core::{ActivityConfig, ArbiterConfig, ExecutorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// `[tools]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(flatten)]
    pub executor: ExecutorConfig,
    /// Extra tool names `orbit parse` accepts besides the built-in tools.
    #[serde(default)]
    pub known: Vec<String>,
}

/// `<config dir>/orbit/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("orbit").join("config.toml"))
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load config from the default location or fall back to defaults.
    pub fn load() -> Result<Self> {
        match default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = write_config("");
        assert_eq!(Config::load_from(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let file = write_config(
            r#"
[arbiter]
hold_ms = 800

[activity]
buffer_max_chars = 4000
generic_min_chars = 60
thinking_keywords = ["brewing", "noodling"]

[activity.tool_labels]
web_search = "Searching the web"

[activity.auto_clear]
generic_ms = 2500

[tools]
browser_timeout_ms = 90000
known = ["n8n_trigger_workflow"]
"#,
        );
        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.arbiter.hold_ms, 800);
        assert_eq!(config.arbiter.debounce_ms, 300);

        assert_eq!(config.activity.buffer_max_chars, 4000);
        assert_eq!(config.activity.matcher.generic_min_chars, 60);
        assert_eq!(config.activity.matcher.thinking_keywords, vec!["brewing", "noodling"]);
        assert!(!config.activity.matcher.running_keywords.is_empty());
        assert_eq!(
            config.activity.matcher.tool_labels.get("web_search").map(String::as_str),
            Some("Searching the web")
        );
        assert_eq!(config.activity.matcher.auto_clear.generic_ms, 2500);
        assert_eq!(config.activity.matcher.auto_clear.mcp_tool_ms, 15_000);

        assert_eq!(config.tools.executor.browser_timeout_ms, 90_000);
        assert_eq!(config.tools.executor.default_timeout_ms, 30_000);
        assert_eq!(config.tools.known, vec!["n8n_trigger_workflow"]);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let file = write_config("[arbiter\nhold_ms = ");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("nope.toml")).is_err());
    }
}
