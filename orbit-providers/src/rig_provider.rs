//! ABOUTME: rig-core backed InferenceProvider - the default concrete LLM client
//! ABOUTME: Covers OpenAI/Anthropic/Cohere; other backends register their own ProviderInstance

use async_trait::async_trait;
use orbit_core::GatewayError;
use rig::completion::CompletionModel;
use rig::providers;

use crate::abstraction::{ProviderCapabilities, ProviderConfig};
use crate::inference::{CompletionRequest, InferenceProvider};

enum RigModel {
    OpenAI(providers::openai::CompletionModel),
    Anthropic(providers::anthropic::completion::CompletionModel),
    Cohere(providers::cohere::CompletionModel),
}

/// Wraps rig-core's per-vendor completion clients behind one
/// [`InferenceProvider`]. Streaming is not exposed by rig's simple
/// completion API, so `complete_streaming` falls back to the default
/// not-implemented error.
pub struct RigInferenceProvider {
    config: ProviderConfig,
    capabilities: ProviderCapabilities,
    model: RigModel,
}

impl RigInferenceProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, GatewayError> {
        let model = match config.name.as_str() {
            "openai" => {
                let api_key = config
                    .api_key
                    .as_ref()
                    .ok_or_else(|| GatewayError::config("openai provider requires an api_key"))?;
                let client = providers::openai::Client::new(api_key);
                RigModel::OpenAI(client.completion_model(&config.model))
            }
            "anthropic" => {
                let api_key = config
                    .api_key
                    .as_ref()
                    .ok_or_else(|| GatewayError::config("anthropic provider requires an api_key"))?;
                let base_url = config.endpoint.as_deref().unwrap_or("https://api.anthropic.com");
                let client = providers::anthropic::Client::new(api_key, base_url, None, "2023-06-01");
                RigModel::Anthropic(client.completion_model(&config.model))
            }
            "cohere" => {
                let api_key = config
                    .api_key
                    .as_ref()
                    .ok_or_else(|| GatewayError::config("cohere provider requires an api_key"))?;
                let client = providers::cohere::Client::new(api_key);
                RigModel::Cohere(client.completion_model(&config.model))
            }
            other => return Err(GatewayError::config(format!("unsupported inference provider: {other}"))),
        };

        let max_context_tokens = match config.name.as_str() {
            "openai" => match config.model.as_str() {
                "gpt-4" | "gpt-4-turbo" => 128_000,
                "gpt-3.5-turbo" => 16_384,
                _ => 8_192,
            },
            "anthropic" => match config.model.as_str() {
                "claude-3-opus" | "claude-3-sonnet" => 200_000,
                _ => 100_000,
            },
            "cohere" => 4_096,
            _ => 4_096,
        };

        let capabilities = ProviderCapabilities {
            supports_streaming: false,
            max_context_tokens: Some(max_context_tokens),
            max_output_tokens: Some(4_096),
            available_models: vec![config.model.clone()],
            custom_features: Default::default(),
        };

        Ok(Self { config, capabilities, model })
    }

    async fn send(&self, prompt: &str) -> Result<String, GatewayError> {
        // rig's simple completion API doesn't expose temperature/max_tokens;
        // CompletionRequest's settings are currently advisory only.
        let extract_message = |choice: rig::completion::ModelChoice| match choice {
            rig::completion::ModelChoice::Message(text) => Ok(text),
            rig::completion::ModelChoice::ToolCall(name, _params) => Err(GatewayError::backend(
                &self.config.name,
                format!("unexpected tool call in completion response: {name}"),
            )),
        };

        match &self.model {
            RigModel::OpenAI(model) => {
                let response = model
                    .completion_request(prompt)
                    .send()
                    .await
                    .map_err(|e| GatewayError::backend(&self.config.name, e.to_string()))?;
                extract_message(response.choice)
            }
            RigModel::Anthropic(model) => {
                let response = model
                    .completion_request(prompt)
                    .send()
                    .await
                    .map_err(|e| GatewayError::backend(&self.config.name, e.to_string()))?;
                extract_message(response.choice)
            }
            RigModel::Cohere(model) => {
                let response = model
                    .completion_request(prompt)
                    .send()
                    .await
                    .map_err(|e| GatewayError::backend(&self.config.name, e.to_string()))?;
                extract_message(response.choice)
            }
        }
    }
}

#[async_trait]
impl InferenceProvider for RigInferenceProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        self.send(&request.prompt).await
    }

    async fn validate(&self) -> Result<(), GatewayError> {
        self.complete(&CompletionRequest::new("respond with the single word: ok").with_temperature(0.0))
            .await
            .map(|_| ())
    }
}

pub fn create_rig_provider(config: ProviderConfig) -> Result<Box<dyn InferenceProvider>, GatewayError> {
    Ok(Box::new(RigInferenceProvider::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = ProviderConfig::new("openai", "gpt-4");
        let err = RigInferenceProvider::new(config).unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn unsupported_provider_name_is_rejected() {
        let config = ProviderConfig::new("not-a-real-vendor", "model");
        let err = RigInferenceProvider::new(config).unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn openai_gpt4_capabilities_reflect_known_context_window() {
        let mut config = ProviderConfig::new("openai", "gpt-4");
        config.api_key = Some("test-key".to_string());
        let provider = RigInferenceProvider::new(config).unwrap();
        assert_eq!(provider.capabilities().max_context_tokens, Some(128_000));
        assert!(!provider.capabilities().supports_streaming);
    }
}
