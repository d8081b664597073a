//! Typed tool registry.
//!
//! Handlers are registered once at startup through [`ToolRegistryBuilder`],
//! which rejects bad names, duplicates and inconsistent parameter specs. The
//! registry then hands out a [`ToolCallParser`] that knows exactly the
//! registered names, so unknown tools are caught before execution.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use orbit_types::ToolArgs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tool_parser::ToolCallParser;
use crate::{OrbitError, Result};

/// How long a tool may run when the caller gives no explicit timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    #[default]
    General,
    /// Drives an external browser process; gets the longer timeout.
    Browser,
}

/// Expected JSON type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
            ParamKind::Any => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
            ParamKind::Array => "array",
            ParamKind::Any => "any",
        }
    }
}

/// One declared argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Static description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ToolCategory,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: ToolCategory::General,
            params: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Check `args` against the declared parameters.
    ///
    /// Undeclared arguments are allowed; models often add harmless extras.
    pub fn validate(&self, args: &ToolArgs) -> std::result::Result<(), String> {
        let mut problems = Vec::new();
        for param in &self.params {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    problems.push(format!("missing required argument '{}'", param.name));
                }
                Some(value) if !value.is_null() && !param.kind.matches(value) => {
                    problems.push(format!(
                        "argument '{}' must be a {}",
                        param.name,
                        param.kind.as_str()
                    ));
                }
                _ => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// Successful handler output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    /// `data:` URL of an image the tool produced.
    pub image_data_url: Option<String>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_data_url: None,
        }
    }

    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image_data_url = Some(data_url.into());
        self
    }
}

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ToolError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ToolError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// An executable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn call(&self, args: ToolArgs) -> std::result::Result<ToolOutput, ToolError>;
}

type BoxedToolFn =
    dyn Fn(ToolArgs) -> BoxFuture<'static, std::result::Result<ToolOutput, ToolError>> + Send + Sync;

/// Adapter that turns an async closure into a [`ToolHandler`].
pub struct FnTool {
    spec: ToolSpec,
    func: Box<BoxedToolFn>,
}

impl FnTool {
    pub fn new<F, Fut>(spec: ToolSpec, func: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ToolOutput, ToolError>> + Send + 'static,
    {
        Self {
            spec,
            func: Box::new(move |args| -> BoxFuture<'static, _> { Box::pin(func(args)) }),
        }
    }
}

#[async_trait]
impl ToolHandler for FnTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, args: ToolArgs) -> std::result::Result<ToolOutput, ToolError> {
        (self.func)(args).await
    }
}

/// Immutable name → handler map.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values().map(|handler| handler.spec())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A parser that accepts exactly the registered tool names.
    pub fn parser(&self) -> ToolCallParser {
        ToolCallParser::new(self.names())
    }
}

/// Collects handlers and validates them in [`build`](Self::build).
#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn register_arc(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Register an async closure.
    pub fn register_fn<F, Fut>(self, spec: ToolSpec, func: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ToolOutput, ToolError>> + Send + 'static,
    {
        self.register(FnTool::new(spec, func))
    }

    pub fn build(self) -> Result<ToolRegistry> {
        let mut tools = BTreeMap::new();
        for handler in self.handlers {
            let spec = handler.spec();
            validate_spec(spec)?;
            if tools.contains_key(&spec.name) {
                return Err(OrbitError::DuplicateTool(spec.name.clone()));
            }
            tracing::debug!(
                target: "orbit::tools",
                "Registered tool {} ({:?}, {} params)",
                spec.name,
                spec.category,
                spec.params.len()
            );
            tools.insert(spec.name.clone(), handler);
        }
        Ok(ToolRegistry { tools })
    }
}

fn validate_spec(spec: &ToolSpec) -> Result<()> {
    let valid_name = !spec.name.is_empty()
        && spec
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid_name {
        return Err(OrbitError::InvalidToolName(spec.name.clone()));
    }

    let mut seen = Vec::with_capacity(spec.params.len());
    for param in &spec.params {
        if param.name.is_empty() {
            return Err(OrbitError::InvalidParamSpec {
                tool: spec.name.clone(),
                reason: "empty parameter name".to_string(),
            });
        }
        if seen.contains(&param.name.as_str()) {
            return Err(OrbitError::InvalidParamSpec {
                tool: spec.name.clone(),
                reason: format!("parameter '{}' declared twice", param.name),
            });
        }
        seen.push(param.name.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_spec() -> ToolSpec {
        ToolSpec::new("web_search")
            .description("Search the web")
            .param(ParamSpec::required("query", ParamKind::String))
            .param(ParamSpec::optional("max_results", ParamKind::Integer))
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_accepts_good_args() {
        let spec = search_spec();
        assert!(spec.validate(&args(json!({"query": "rust"}))).is_ok());
        assert!(spec.validate(&args(json!({"query": "rust", "max_results": 5}))).is_ok());
        assert!(spec.validate(&args(json!({"query": "rust", "extra": true}))).is_ok());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let spec = search_spec();
        let err = spec.validate(&args(json!({"max_results": "five"}))).unwrap_err();
        assert!(err.contains("missing required argument 'query'"), "{}", err);
        assert!(err.contains("argument 'max_results' must be a integer"), "{}", err);

        let err = spec.validate(&args(json!({"query": null}))).unwrap_err();
        assert!(err.contains("missing required argument 'query'"));
    }

    #[test]
    fn test_integer_rejects_float() {
        assert!(!ParamKind::Integer.matches(&json!(1.5)));
        assert!(ParamKind::Number.matches(&json!(1.5)));
        assert!(ParamKind::Any.matches(&json!([1])));
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let result = ToolRegistry::builder()
            .register_fn(search_spec(), |_| async { Ok::<_, ToolError>(ToolOutput::text("a")) })
            .register_fn(search_spec(), |_| async { Ok::<_, ToolError>(ToolOutput::text("b")) })
            .build();
        assert!(matches!(result, Err(OrbitError::DuplicateTool(name)) if name == "web_search"));
    }

    #[test]
    fn test_builder_rejects_bad_names() {
        let result = ToolRegistry::builder()
            .register_fn(ToolSpec::new("bad name"), |_| async { Ok::<_, ToolError>(ToolOutput::default()) })
            .build();
        assert!(matches!(result, Err(OrbitError::InvalidToolName(_))));

        let result = ToolRegistry::builder()
            .register_fn(
                ToolSpec::new("twice")
                    .param(ParamSpec::required("a", ParamKind::Any))
                    .param(ParamSpec::optional("a", ParamKind::Any)),
                |_| async { Ok::<_, ToolError>(ToolOutput::default()) },
            )
            .build();
        assert!(matches!(result, Err(OrbitError::InvalidParamSpec { .. })));
    }

    #[test]
    fn test_parser_knows_registered_names() {
        let registry = ToolRegistry::builder()
            .register_fn(search_spec(), |_| async { Ok::<_, ToolError>(ToolOutput::default()) })
            .register_fn(
                ToolSpec::new("browser_control").category(ToolCategory::Browser),
                |_| async { Ok::<_, ToolError>(ToolOutput::default()) },
            )
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["browser_control", "web_search"]);

        let parser = registry.parser();
        assert!(parser.is_known("web_search"));
        assert!(!parser.is_known("memory_search"));
    }

    #[tokio::test]
    async fn test_fn_tool_invokes_closure() {
        let tool = FnTool::new(search_spec(), |args: ToolArgs| async move {
            let query = args.get("query").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok::<_, ToolError>(ToolOutput::text(format!("results for {}", query)))
        });
        let output = tool.call(args(json!({"query": "tokio"}))).await.unwrap();
        assert_eq!(output.text, "results for tokio");
    }

    #[test]
    fn test_tool_error_displays_message() {
        let err = ToolError::from("quota exceeded");
        assert_eq!(err.to_string(), "quota exceeded");
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(ToolError::new("offline"));
        assert_eq!(boxed.to_string(), "offline");
    }
}
