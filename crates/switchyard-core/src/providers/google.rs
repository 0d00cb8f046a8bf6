//! Google Gemini provider

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::OracleError;

use super::types::{
    Capability, GenerateRequest, GenerateResponse, LlmProvider, ResponseBlock, StopReason,
    ToolCall, Usage,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini provider over the `generateContent` REST endpoint
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: Url,
    max_output_tokens: Option<u32>,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("base_url", &self.base_url.as_str())
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl GoogleProvider {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OracleError::Transport)?;

        // Url::join drops the last path segment unless it ends with '/'
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        Ok(Self {
            client,
            api_key,
            base_url,
            max_output_tokens: None,
        })
    }

    /// Cap the number of generated tokens per call
    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    fn endpoint(&self, model: &str) -> Result<Url, OracleError> {
        Ok(self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", model))?)
    }

    /// Build the Gemini request body
    fn to_gemini_body(
        request: &GenerateRequest,
        max_output_tokens: Option<u32>,
    ) -> Result<Value, OracleError> {
        let contents = vec![GeminiContent {
            role: "user".to_string(),
            parts: request
                .contents
                .iter()
                .map(|text| GeminiPart::Text { text: text.clone() })
                .collect(),
        }];

        let mut body = serde_json::json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{"text": request.system}]
            },
        });

        let gemini_tools = Self::to_gemini_tools(&request.capabilities);
        if !gemini_tools.is_empty() {
            body["tools"] = serde_json::to_value(&gemini_tools)?;
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".to_string(), temperature.into());
        }
        if let Some(max) = max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), max.into());
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }

        Ok(body)
    }

    /// Declare capabilities as Gemini functions
    fn to_gemini_tools(capabilities: &[Capability]) -> Vec<GeminiToolDecl> {
        if capabilities.is_empty() {
            return vec![];
        }
        vec![GeminiToolDecl {
            function_declarations: capabilities
                .iter()
                .map(|c| GeminiFunctionDeclaration {
                    name: c.function_name().to_string(),
                    description: c.description().to_string(),
                    parameters: c.parameters(),
                })
                .collect(),
        }]
    }

    /// Convert Gemini response to provider-agnostic format
    fn from_gemini_response(resp: GeminiApiResponse) -> Result<GenerateResponse, OracleError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or(OracleError::NoCandidates)?;

        let mut blocks = Vec::new();
        let mut has_tool_calls = false;

        for part in candidate.content.parts {
            match part {
                GeminiPart::Text { text } => {
                    blocks.push(ResponseBlock::Text { text });
                }
                GeminiPart::FunctionCall { function_call } => {
                    has_tool_calls = true;
                    let args = if function_call.args.is_null() {
                        Value::Object(serde_json::Map::new())
                    } else {
                        function_call.args
                    };
                    blocks.push(ResponseBlock::ToolCall(ToolCall {
                        name: function_call.name,
                        args,
                    }));
                }
                GeminiPart::Other(other) => {
                    debug!("Ignoring unsupported Gemini part: {}", other);
                }
            }
        }

        let stop_reason = if has_tool_calls {
            StopReason::ToolUse
        } else {
            match candidate.finish_reason.as_deref() {
                Some("STOP") | None => StopReason::EndTurn,
                Some("MAX_TOKENS") => StopReason::MaxTokens,
                Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST")
                | Some("PROHIBITED_CONTENT") => StopReason::Safety,
                Some(_) => StopReason::Unknown,
            }
        };

        let usage = resp.usage_metadata.map_or(Usage::default(), |u| Usage {
            input_tokens: u.prompt_token_count.unwrap_or(0),
            output_tokens: u.candidates_token_count.unwrap_or(0),
        });

        Ok(GenerateResponse {
            blocks,
            stop_reason,
            usage,
        })
    }

    /// Map an HTTP status and body to a response or error
    fn decode_response(status: StatusCode, body: &str) -> Result<GenerateResponse, OracleError> {
        if !status.is_success() {
            return Err(OracleError::Http {
                status,
                body: body.to_string(),
            });
        }

        let api_response: GeminiApiResponse =
            serde_json::from_str(body).map_err(OracleError::Decode)?;

        debug!(
            "Gemini response: candidates={}",
            api_response.candidates.len()
        );

        Self::from_gemini_response(api_response)
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, OracleError> {
        let url = self.endpoint(&request.model)?;
        let body = Self::to_gemini_body(request, self.max_output_tokens)?;

        debug!(
            "Gemini request: model={}, parts={}, tools={}, temperature={:?}",
            request.model,
            request.contents.len(),
            request.capabilities.len(),
            request.temperature
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(OracleError::Transport)?;

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(_) if !status.is_success() => "Unknown error".to_string(),
            Err(e) => return Err(OracleError::Transport(e)),
        };

        Self::decode_response(status, &text)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    // executableCode, thoughts and anything newer
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiToolDecl {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    #[serde(default = "empty_content")]
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

fn empty_content() -> GeminiContent {
    GeminiContent {
        role: "model".to_string(),
        parts: Vec::new(),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
}
