use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::{prompts, CompletionOptions, LlmProvider};

/// Input for one understanding call.
#[derive(Debug, Clone)]
pub struct UnderstandingRequest {
    pub query: String,
    pub recent_context_summary: String,
    pub catalog_capabilities: Value,
    /// Set on the single retry after a malformed reply.
    pub strict: bool,
}

/// External service that proposes a structured intent for a question.
/// Its output is untrusted.
#[async_trait]
pub trait UnderstandingService: Send + Sync {
    async fn understand(&self, request: &UnderstandingRequest) -> Result<Value>;

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl UnderstandingService for LlmProvider {
    async fn understand(&self, request: &UnderstandingRequest) -> Result<Value> {
        let prompt = prompts::intent_resolution_prompt(
            &request.query,
            &request.recent_context_summary,
            &request.catalog_capabilities.to_string(),
            request.strict,
        );
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(800),
        };
        self.complete_json(&prompt, Some(prompts::INTENT_SYSTEM_PROMPT), Some(&options))
            .await
    }

    fn is_available(&self) -> bool {
        LlmProvider::is_available(self)
    }
}
