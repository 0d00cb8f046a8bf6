//! switchyard-core - route a query to a specialist instruction and run it
//!
//! This crate provides:
//! - The instruction map of specialist agents and their system prompts
//! - A provider abstraction with a Google Gemini implementation
//! - The router, which asks the model which agent fits a query
//! - The executor, which runs the query under that agent's instruction
//! - A sequential driver that reports each step to a [`Reporter`]

pub mod driver;
pub mod error;
pub mod executor;
pub mod instructions;
pub mod providers;
pub mod router;

pub use driver::{QueryOutcome, Reporter, RunSummary, SAMPLE_QUERIES, Switchyard};
pub use error::{ExecutionError, ExecutionFailure, InstructionError, OracleError, RoutingFailure};
pub use executor::{AgentResponse, ExecutorConfig};
pub use instructions::{AgentInstruction, InstructionMap};
pub use providers::{Capability, GoogleProvider, LlmProvider, ToolCall};
pub use router::{RouterConfig, RoutingDecision};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _ = std::mem::size_of::<Switchyard>();
        let _ = std::mem::size_of::<InstructionMap>();
        let _ = std::mem::size_of::<AgentResponse>();
        let _ = std::mem::size_of::<RoutingDecision>();
        let _ = std::mem::size_of::<RunSummary>();
    }
}
