//! Provider-agnostic request and response types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OracleError;

/// A capability the model may ask to invoke. Both are implemented by the
/// provider; this crate only declares them and reports the calls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Search,
    CodeExecution,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Search, Capability::CodeExecution];

    /// Function name the model sees and calls
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Search => "google_search",
            Self::CodeExecution => "code_executor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Search => "Search the web for up-to-date information.",
            Self::CodeExecution => {
                "Execute Python code. Provide the complete program to run."
            }
        }
    }

    /// JSON schema of the call arguments
    pub fn parameters(&self) -> Value {
        let (arg, description) = match self {
            Self::Search => ("query", "The search query"),
            Self::CodeExecution => ("code", "The Python source code to execute"),
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                arg: { "type": "string", "description": description }
            },
            "required": [arg],
        })
    }

    /// Reverse lookup from a function name reported by the model
    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.function_name() == name)
    }
}

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    /// User content parts, sent in order as a single user turn
    pub contents: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub temperature: Option<f32>,
}

/// A function call the model asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn capability(&self) -> Option<Capability> {
        Capability::from_function_name(&self.name)
    }
}

/// A block in the response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBlock {
    Text { text: String },
    ToolCall(ToolCall),
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Safety,
    Unknown,
}

/// Token usage from a single API call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub blocks: Vec<ResponseBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl GenerateResponse {
    /// Plain text response, no tool calls
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![ResponseBlock::Text { text: text.into() }],
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        }
    }

    /// Concatenated text parts; empty when the model only called tools
    pub fn joined_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::ToolCall(_) => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ResponseBlock::ToolCall(call) => Some(call.clone()),
                ResponseBlock::Text { .. } => None,
            })
            .collect()
    }
}

/// Trait that LLM providers implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "google")
    fn provider_name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, OracleError>;
}
