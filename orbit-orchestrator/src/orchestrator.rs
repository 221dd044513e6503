//! ABOUTME: Chat Orchestrator (C10) - throttle, retrieval fan-out, prompt assembly, LLM call
//! ABOUTME: Always answers: degrades to a bare-LLM or fallback message rather than erroring out

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use orbit_core::{AdapterResult, ContextItem, RetrieveOptions};
use orbit_executor::ParallelAdapterExecutor;
use orbit_providers::{CompletionRequest, InferenceProviderManager};
use orbit_quota::ThrottleMiddleware;
use tracing::warn;

use crate::prompt;
use crate::types::{ChatOutcome, ChatRequest};

/// Behaviour knobs that aren't owned by any one upstream crate.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Adapters fanned out to when a request doesn't name its own.
    pub default_adapters: Vec<String>,
    /// Named inference provider to use; `None` defers to the manager's default.
    pub inference_provider: Option<String>,
    /// Answer returned when the LLM call itself can't be completed.
    pub fallback_message: String,
    /// Per-request deadline carried from the (out-of-scope) HTTP layer; the
    /// innermost of the three layered timeouts.
    pub request_timeout: Duration,
    /// The HTTP path used for throttle bookkeeping and excluded-path checks.
    pub throttle_path: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_adapters: Vec::new(),
            inference_provider: None,
            fallback_message: "I don't have enough information to answer that right now.".to_string(),
            request_timeout: Duration::from_secs(30),
            throttle_path: "/v1/chat".to_string(),
        }
    }
}

pub struct ChatOrchestrator {
    throttle: Arc<ThrottleMiddleware>,
    executor: Arc<ParallelAdapterExecutor>,
    inference: Arc<InferenceProviderManager>,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    #[must_use]
    pub fn new(
        throttle: Arc<ThrottleMiddleware>,
        executor: Arc<ParallelAdapterExecutor>,
        inference: Arc<InferenceProviderManager>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { throttle, executor, inference, config }
    }

    /// Runs the full chat pipeline for one request. Always returns a
    /// `ChatOutcome` - retrieval and LLM failures degrade rather than
    /// propagate, since a chat endpoint must still answer something.
    pub async fn handle_chat(&self, request: ChatRequest, api_key: &str) -> ChatOutcome {
        let decision = self.throttle.check(api_key, &self.config.throttle_path).await;
        if decision.rejected {
            let retry_after = decision.usage.daily_ttl_remaining.min(decision.usage.monthly_ttl_remaining).max(0) as u64;
            return ChatOutcome::Throttled {
                reason: decision.reason.unwrap_or_else(|| "rate limit exceeded".to_string()),
                retry_after: Duration::from_secs(retry_after),
            };
        }
        if !decision.delay.is_zero() {
            tokio::time::sleep(decision.delay).await;
        }

        match tokio::time::timeout(self.config.request_timeout, self.retrieve_and_answer(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("chat request exceeded its orchestrator-level deadline");
                ChatOutcome::Answer { response: self.config.fallback_message.clone(), sources: Vec::new() }
            }
        }
    }

    async fn retrieve_and_answer(&self, request: ChatRequest) -> ChatOutcome {
        let adapter_names = request.adapters.clone().unwrap_or_else(|| self.config.default_adapters.clone());
        let query = request.last_user_message().to_string();
        let options = RetrieveOptions { session_id: request.session_id.clone(), limit: None, params: HashMap::new() };

        let results = if adapter_names.is_empty() {
            Vec::new()
        } else {
            self.executor.execute(&query, &adapter_names, &options).await
        };

        let sources = merge_context(&results);
        let prompt = prompt::assemble(&request.messages, &sources);

        let provider = match self.inference.get(self.config.inference_provider.as_deref()).await {
            Ok(provider) => provider,
            Err(err) => {
                warn!(error = %err, "no inference provider available for chat request");
                return ChatOutcome::Answer { response: self.config.fallback_message.clone(), sources };
            }
        };

        let completion_request = CompletionRequest::new(prompt);

        if request.stream {
            match provider.complete_streaming(&completion_request).await {
                Ok(stream) => return ChatOutcome::Streaming { stream, sources },
                Err(err) => warn!(error = %err, "streaming completion unavailable, falling back to non-streaming"),
            }
        }

        match provider.complete(&completion_request).await {
            Ok(response) => ChatOutcome::Answer { response, sources },
            Err(err) => {
                warn!(error = %err, "inference call failed, degrading to fallback message");
                ChatOutcome::Answer { response: self.config.fallback_message.clone(), sources: Vec::new() }
            }
        }
    }
}

/// Flattens the successful adapter results, preserving adapter order (the
/// order `adapter_names` was given in) with no cross-adapter deduplication.
/// Items already stamped by their adapter keep that stamp; this only fills
/// in `source_adapter` for the rare adapter that doesn't stamp its own items.
fn merge_context(results: &[AdapterResult]) -> Vec<ContextItem> {
    results
        .iter()
        .filter(|result| result.success)
        .flat_map(|result| {
            result.data.iter().cloned().map(|item| {
                if item.source_adapter.is_some() {
                    item
                } else {
                    item.with_source_adapter(result.adapter_name.clone())
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, success: bool, items: Vec<ContextItem>) -> AdapterResult {
        if success {
            AdapterResult::success(name, items, Duration::ZERO)
        } else {
            AdapterResult::failure(name, "boom", Duration::ZERO)
        }
    }

    #[test]
    fn merge_drops_failed_adapters_and_keeps_order() {
        let results = vec![
            result("a", true, vec![ContextItem::new("one", 0.5)]),
            result("b", false, vec![]),
            result("c", true, vec![ContextItem::new("two", 0.5)]),
        ];
        let merged = merge_context(&results);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "one");
        assert_eq!(merged[1].content, "two");
    }

    #[test]
    fn merge_stamps_source_adapter_only_when_missing() {
        let pre_stamped = ContextItem::new("x", 0.5).with_source_adapter("original");
        let results = vec![result("a", true, vec![ContextItem::new("unstamped", 0.5), pre_stamped])];
        let merged = merge_context(&results);
        assert_eq!(merged[0].source_adapter.as_deref(), Some("a"));
        assert_eq!(merged[1].source_adapter.as_deref(), Some("original"));
    }

    #[test]
    fn merge_of_all_failures_is_empty() {
        let results = vec![result("a", false, vec![]), result("b", false, vec![])];
        assert!(merge_context(&results).is_empty());
    }
}
