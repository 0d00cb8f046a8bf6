//! Query routing
//!
//! Asks the model which instruction key fits a query, then checks the answer
//! against the instruction map. Anything that is not an exact key, and any
//! provider error, degrades to the fallback (planner) key. There is no retry.

use tracing::{debug, warn};

use crate::error::RoutingFailure;
use crate::instructions::InstructionMap;
use crate::providers::{GenerateRequest, LlmProvider};

const ROUTER_SYSTEM_INSTRUCTION: &str =
    "You are a routing expert. Follow the instructions strictly and output only the key.";

/// Configuration for the query router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Model used for the routing call
    pub model: String,
    /// Returned on invalid output or provider error; also the key the model is
    /// told to pick for multi-step queries. Must exist in the instruction map.
    pub fallback_key: String,
    pub temperature: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            fallback_key: "PlannerAgent".to_string(),
            temperature: 0.0,
        }
    }
}

/// Outcome of routing one query
#[derive(Debug)]
pub struct RoutingDecision {
    pub key: String,
    /// Set when the fallback key was used
    pub failure: Option<RoutingFailure>,
}

impl RoutingDecision {
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

/// Route a query to one key of the instruction map.
///
/// Never fails: the returned key is either the model's answer, verbatim and
/// present in `instructions`, or `config.fallback_key`.
pub async fn route_query(
    provider: &dyn LlmProvider,
    instructions: &InstructionMap,
    config: &RouterConfig,
    query: &str,
) -> RoutingDecision {
    let request = GenerateRequest {
        model: config.model.clone(),
        system: ROUTER_SYSTEM_INSTRUCTION.to_string(),
        contents: vec![
            build_routing_prompt(instructions, &config.fallback_key),
            format!("User Query: {}", query),
        ],
        capabilities: Vec::new(),
        temperature: Some(config.temperature),
    };

    let response = match provider.generate(&request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Routing call failed, using {}: {}", config.fallback_key, e);
            return fallback(config, RoutingFailure::Oracle(e));
        }
    };

    let raw = response.joined_text();
    let key = sanitize_key(&raw);
    if instructions.contains(key) {
        debug!("Routed query to {}", key);
        return RoutingDecision {
            key: key.to_string(),
            failure: None,
        };
    }

    warn!(
        "Model returned invalid key {:?}, using {}",
        key, config.fallback_key
    );
    fallback(config, RoutingFailure::InvalidKey(key.to_string()))
}

fn fallback(config: &RouterConfig, failure: RoutingFailure) -> RoutingDecision {
    RoutingDecision {
        key: config.fallback_key.clone(),
        failure: Some(failure),
    }
}

/// Prompt listing every key, in map order
fn build_routing_prompt(instructions: &InstructionMap, planner_key: &str) -> String {
    let keys = instructions
        .keys()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(", ");
    let example = instructions
        .keys()
        .find(|k| *k != planner_key)
        .unwrap_or(planner_key);

    format!(
        "You are the Root Agent. Your only task is to analyze the following user query \
         and identify the single MOST appropriate specialized instruction key from the list below. \
         If the query is complex or multi-step, choose '{planner}'. Otherwise, choose the \
         most relevant specialist.\n\n\
         Available Instruction Keys: [{keys}]\n\n\
         Respond ONLY with the chosen Instruction Key (e.g., '{example}').\n\
         Do not add any other text, explanation, or punctuation.",
        planner = planner_key,
        keys = keys,
        example = example,
    )
}

/// Strip whitespace and surrounding quotes from the model's answer
fn sanitize_key(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| matches!(c, '\'' | '"' | '`'))
        .trim()
}
