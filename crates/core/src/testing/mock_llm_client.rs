//! Mock LLM client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Mock implementation of the LlmClient trait.
///
/// Responses are scripted in order with [`push_text`](Self::push_text) and
/// [`push_error`](Self::push_error). Once the script is exhausted the
/// default error is returned, if set; otherwise the call fails as
/// not configured.
#[derive(Debug)]
pub struct MockLlmClient {
    model: String,
    script: Arc<RwLock<VecDeque<Result<CompletionResponse, LlmError>>>>,
    default_error: Arc<RwLock<Option<LlmError>>>,
    requests: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::with_model("mock-model")
    }

    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(RwLock::new(VecDeque::new())),
            default_error: Arc::new(RwLock::new(None)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue a successful response with the given text.
    pub async fn push_text(&self, text: impl Into<String>) {
        let response = CompletionResponse {
            text: text.into(),
            usage: LlmUsage::default(),
            model: self.model.clone(),
        };
        self.script.write().await.push_back(Ok(response));
    }

    /// Queue a failure.
    pub async fn push_error(&self, error: LlmError) {
        self.script.write().await.push_back(Err(error));
    }

    /// Error returned once the script is exhausted.
    pub async fn set_default_error(&self, error: LlmError) {
        *self.default_error.write().await = Some(error);
    }

    /// Number of completion calls made.
    pub async fn call_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Every request received, in order.
    pub async fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.write().await.push(request);

        if let Some(next) = self.script.write().await.pop_front() {
            return next;
        }

        match self.default_error.read().await.clone() {
            Some(error) => Err(error),
            None => Err(LlmError::NotConfigured(
                "mock has no scripted response".to_string(),
            )),
        }
    }
}
