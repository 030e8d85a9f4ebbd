//! Model backend abstraction
//!
//! The conversation engine treats the backend as an opaque remote function:
//! request in, final text or tool calls out, or an error.

mod error;
mod openai;
#[cfg(test)]
pub mod testing;
mod types;

pub use error::LlmError;
pub use openai::OpenAIService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for chat-completion backends
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    tool_calls = response.tool_calls.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    total_tokens = response.usage.total(),
                    finish_reason = response.finish_reason.as_deref().unwrap_or("none"),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    transient = e.kind.is_transient(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Stand-in backend used when no credential is configured.
///
/// Keeps the assistant constructible; every call fails with a
/// not-configured error.
pub struct UnconfiguredService {
    model_id: String,
}

impl UnconfiguredService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl LlmService for UnconfiguredService {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::not_configured())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::error::LlmErrorKind;
    use super::testing::MockLlmService;
    use super::*;

    fn empty_request() -> LlmRequest {
        LlmRequest {
            system: "sys".to_string(),
            messages: vec![],
            tools: vec![],
            max_tokens: None,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_always_fails() {
        let service = UnconfiguredService::new("gpt-3.5-turbo");
        for _ in 0..3 {
            let err = service.complete(&empty_request()).await.unwrap_err();
            assert_eq!(err.kind, LlmErrorKind::NotConfigured);
        }
        assert_eq!(service.model_id(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_logging_service_passes_through() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_response(LlmResponse::text("hi"));
        mock.queue_error(LlmError::server_error("boom"));

        let logged = LoggingService::new(mock.clone());
        assert_eq!(logged.model_id(), "mock");

        let ok = logged.complete(&empty_request()).await.unwrap();
        assert_eq!(ok.text_content(), "hi");

        let err = logged.complete(&empty_request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ServerError);
        assert_eq!(mock.recorded_requests().len(), 2);
    }
}
