//! Runs a routed query under its agent's instruction

use tracing::{debug, info};

use crate::error::{ExecutionError, ExecutionFailure};
use crate::instructions::InstructionMap;
use crate::providers::{Capability, GenerateRequest, LlmProvider, StopReason, ToolCall, Usage};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub standard_model: String,
    /// Used only for `creative_key`
    pub creative_model: String,
    pub creative_key: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            standard_model: "gemini-2.5-flash".to_string(),
            creative_model: "gemini-2.5-pro".to_string(),
            creative_key: "CreativeAgent".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Model for a routing key
    pub fn select_model(&self, key: &str) -> &str {
        if key == self.creative_key {
            &self.creative_model
        } else {
            &self.standard_model
        }
    }
}

/// What the agent produced for one query
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub key: String,
    pub model: String,
    /// Final text; empty when the model only asked for tools
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl AgentResponse {
    pub fn requires_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Execute `query` with the instruction registered for `key`, offering the
/// model both capabilities.
pub async fn execute_query(
    provider: &dyn LlmProvider,
    instructions: &InstructionMap,
    config: &ExecutorConfig,
    key: &str,
    query: &str,
) -> Result<AgentResponse, ExecutionFailure> {
    let fail = |source: ExecutionError| ExecutionFailure {
        key: key.to_string(),
        source,
    };

    let instruction = instructions
        .get(key)
        .ok_or_else(|| fail(ExecutionError::UnknownKey))?;
    let model = config.select_model(key);

    let request = GenerateRequest {
        model: model.to_string(),
        system: instruction.to_string(),
        contents: vec![instruction.to_string(), query.to_string()],
        capabilities: Capability::ALL.to_vec(),
        temperature: None,
    };

    debug!("Executing {} with model {}", key, model);

    let response = provider
        .generate(&request)
        .await
        .map_err(|e| fail(ExecutionError::Oracle(e)))?;

    let tool_calls = response.tool_calls();
    info!(
        "{} answered: {} tool calls, {} input / {} output tokens",
        key,
        tool_calls.len(),
        response.usage.input_tokens,
        response.usage.output_tokens
    );

    Ok(AgentResponse {
        key: key.to_string(),
        model: model.to_string(),
        text: response.joined_text(),
        tool_calls,
        stop_reason: response.stop_reason,
        usage: response.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use crate::providers::{GenerateResponse, ResponseBlock};

    fn map() -> InstructionMap {
        InstructionMap::builtin().unwrap()
    }

    #[test]
    fn test_select_model_creative() {
        let config = ExecutorConfig::default();
        assert_eq!(config.select_model("CreativeAgent"), "gemini-2.5-pro");
    }

    #[test]
    fn test_select_model_standard_for_everything_else() {
        let config = ExecutorConfig::default();
        for key in map().keys().filter(|k| *k != "CreativeAgent") {
            assert_eq!(config.select_model(key), "gemini-2.5-flash", "key {}", key);
        }
        assert_eq!(config.select_model("creativeagent"), "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_request_uses_instruction_and_capabilities() {
        let provider = MockProvider::replying("ok");
        let map = map();
        execute_query(
            &provider,
            &map,
            &ExecutorConfig::default(),
            "CreativeAgent",
            "three campaign ideas",
        )
        .await
        .unwrap();

        let requests = provider.requests();
        let request = &requests[0];
        let instruction = map.get("CreativeAgent").unwrap();
        assert_eq!(request.model, "gemini-2.5-pro");
        assert_eq!(request.system, instruction);
        assert_eq!(
            request.contents,
            vec![instruction.to_string(), "three campaign ideas".to_string()]
        );
        assert_eq!(request.capabilities, Capability::ALL.to_vec());
        assert_eq!(request.temperature, None);
    }

    #[tokio::test]
    async fn test_plain_text_response() {
        let provider = MockProvider::replying("Islamabad is the capital of Pakistan.");
        let response = execute_query(
            &provider,
            &map(),
            &ExecutorConfig::default(),
            "PlannerAgent",
            "What is the capital city of Pakistan?",
        )
        .await
        .unwrap();

        assert_eq!(response.key, "PlannerAgent");
        assert_eq!(response.model, "gemini-2.5-flash");
        assert_eq!(response.text, "Islamabad is the capital of Pakistan.");
        assert!(!response.requires_tools());
    }

    #[tokio::test]
    async fn test_tool_calls_are_preserved_in_order() {
        let provider = MockProvider::new(|_| {
            Ok(GenerateResponse {
                blocks: vec![
                    ResponseBlock::ToolCall(ToolCall {
                        name: "google_search".to_string(),
                        args: serde_json::json!({"query": "factorial"}),
                    }),
                    ResponseBlock::ToolCall(ToolCall {
                        name: "code_executor".to_string(),
                        args: serde_json::json!({"code": "import math\nprint(math.factorial(7))"}),
                    }),
                ],
                stop_reason: StopReason::ToolUse,
                usage: Usage::default(),
            })
        });

        let response = execute_query(
            &provider,
            &map(),
            &ExecutorConfig::default(),
            "CodingAgent",
            "factorial of 7",
        )
        .await
        .unwrap();

        assert!(response.requires_tools());
        let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["google_search", "code_executor"]);
        assert_eq!(response.text, "");
    }

    #[tokio::test]
    async fn test_provider_error_names_key() {
        let provider = MockProvider::failing();
        let failure = execute_query(
            &provider,
            &map(),
            &ExecutorConfig::default(),
            "NetSecAgent",
            "aircrack",
        )
        .await
        .unwrap_err();

        assert_eq!(failure.key, "NetSecAgent");
        assert!(matches!(failure.source, ExecutionError::Oracle(_)));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let provider = MockProvider::replying("unused");
        let failure = execute_query(
            &provider,
            &map(),
            &ExecutorConfig::default(),
            "GhostAgent",
            "boo",
        )
        .await
        .unwrap_err();

        assert!(matches!(failure.source, ExecutionError::UnknownKey));
        assert!(provider.requests().is_empty());
    }
}
