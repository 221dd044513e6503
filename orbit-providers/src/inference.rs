//! ABOUTME: The LLM inference capability - completions and streaming completions
//! ABOUTME: Temperature is advisory; not every backend honors it through its simple API

use async_trait::async_trait;
use orbit_core::GatewayError;

use crate::abstraction::ProviderCapabilities;

/// One completion call. `temperature` defaults to a chat-like setting; the
/// Intent Engine's parameter extraction overrides it to `<= 0.1` for
/// deterministic JSON output.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A streamed chunk of a completion response.
#[derive(Debug, Clone)]
pub struct CompletionChunk {
    pub text: String,
    pub is_final: bool,
}

pub type CompletionStream =
    std::pin::Pin<Box<dyn tokio_stream::Stream<Item = Result<CompletionChunk, GatewayError>> + Send>>;

/// An LLM backend capable of producing completions.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn capabilities(&self) -> &ProviderCapabilities;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError>;

    /// Default: not implemented. Concrete providers override this when their
    /// underlying client exposes a streaming API.
    async fn complete_streaming(&self, _request: &CompletionRequest) -> Result<CompletionStream, GatewayError> {
        Err(GatewayError::backend(
            self.name(),
            "streaming completions not implemented for this provider",
        ))
    }

    async fn validate(&self) -> Result<(), GatewayError>;
}
