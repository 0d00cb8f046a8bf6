//! Error types for oracle calls, routing, execution and instruction loading

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to the LLM provider
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("request failed with status {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("response had no candidates")]
    NoCandidates,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("failed to encode request: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why the router fell back to the default key
#[derive(Debug, Error)]
pub enum RoutingFailure {
    #[error("model returned invalid key: {0}")]
    InvalidKey(String),

    #[error("failed to route query: {0}")]
    Oracle(#[source] OracleError),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no instruction registered for this key")]
    UnknownKey,

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// A query that could not be executed. Carries the key it was routed to.
#[derive(Debug, Error)]
#[error("API Call failed for {key}: {source}")]
pub struct ExecutionFailure {
    pub key: String,
    #[source]
    pub source: ExecutionError,
}

#[derive(Debug, Error)]
pub enum InstructionError {
    #[error("failed to read instruction file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse instruction map: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("instruction map is empty")]
    Empty,

    #[error("invalid agent key {0:?}: keys must be non-empty and contain no whitespace or quotes")]
    InvalidKey(String),

    #[error("duplicate agent key {0:?}")]
    DuplicateKey(String),

    #[error("agent {0:?} has an empty instruction")]
    EmptyInstruction(String),

    #[error("agent key {0:?} is required but not present in the instruction map")]
    MissingKey(String),
}
