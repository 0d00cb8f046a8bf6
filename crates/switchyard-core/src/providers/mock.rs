use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::OracleError;

use super::types::{GenerateRequest, GenerateResponse, LlmProvider};

type Handler =
    Box<dyn Fn(&GenerateRequest) -> Result<GenerateResponse, OracleError> + Send + Sync>;

/// In-process provider that answers with a closure and records every request
pub(crate) struct MockProvider {
    handler: Handler,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    pub(crate) fn new(
        handler: impl Fn(&GenerateRequest) -> Result<GenerateResponse, OracleError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text
    pub(crate) fn replying(text: &'static str) -> Self {
        Self::new(move |_| Ok(GenerateResponse::text(text)))
    }

    /// Always fails
    pub(crate) fn failing() -> Self {
        Self::new(|_| Err(OracleError::NoCandidates))
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}
