//! Tool invocation types exchanged between the parser, the executor and the
//! conversation loop.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument object of a tool call.
pub type ToolArgs = Map<String, Value>;

/// A tool invocation extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name as written by the model.
    pub tool: String,
    /// Arguments (always an object, possibly empty).
    #[serde(default)]
    pub args: ToolArgs,
    /// Set when the tool name is not registered. The message lists the
    /// known tools so it can be relayed back to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            tool: tool.into(),
            args,
            error: None,
        }
    }

    /// Whether the call names a registered tool.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one tool execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `data:` URL of an image produced by the tool (screenshots etc).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
}

impl ToolResult {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image_data_url = Some(data_url.into());
        self
    }
}

/// Tool output as it is fed back into the conversation.
///
/// `Vision` is only produced for successful results carrying an image, and
/// tells the caller to use a vision-capable channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormattedToolOutput {
    Text(String),
    Vision {
        text: String,
        #[serde(rename = "imageDataUrl")]
        image_data_url: String,
    },
}

impl FormattedToolOutput {
    /// Text part of the output, regardless of shape.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Vision { text, .. } => text,
        }
    }

    pub fn image_data_url(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Vision { image_data_url, .. } => Some(image_data_url),
        }
    }
}
