//! LLM provider abstraction
//!
//! The router and executor talk to the model through the [`LlmProvider`]
//! trait. [`google::GoogleProvider`] is the production implementation.

pub mod google;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

pub use google::GoogleProvider;
pub use types::{
    Capability, GenerateRequest, GenerateResponse, LlmProvider, ResponseBlock, StopReason,
    ToolCall, Usage,
};
