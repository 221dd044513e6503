//! ABOUTME: Chat request/response shapes handed across the orchestrator boundary

use orbit_core::ContextItem;
use orbit_providers::CompletionStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One turn of chat history. `role` is `"user"`, `"assistant"`, or `"system"`;
/// the orchestrator doesn't interpret it beyond including it in the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// One chat turn. `adapters` overrides the orchestrator's default adapter
/// set for this call only; `session_id` flows through to adapters that keep
/// short-lived per-session state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub adapters: Option<Vec<String>>,
    pub session_id: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    /// The most recent user turn, used as the retrieval query. Empty if the
    /// request carries no user message (malformed, but not our job to reject).
    #[must_use]
    pub fn last_user_message(&self) -> &str {
        self.messages.iter().rev().find(|m| m.role == "user").map(|m| m.content.as_str()).unwrap_or_default()
    }
}

/// What `handle_chat` hands back. Streaming and non-streaming answers both
/// carry the `sources` that grounded them, computed before the LLM call so
/// callers see attribution even for a streamed response.
pub enum ChatOutcome {
    /// Throttle middleware rejected the request (429-equivalent).
    Throttled { reason: String, retry_after: Duration },
    /// A complete text answer, either context-grounded or a bare-LLM/fallback
    /// degradation (distinguished by `sources` being empty).
    Answer { response: String, sources: Vec<ContextItem> },
    /// A streaming answer; `sources` is already final because retrieval runs
    /// to completion before the LLM call starts.
    Streaming { stream: CompletionStream, sources: Vec<ContextItem> },
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throttled { reason, retry_after } => {
                f.debug_struct("Throttled").field("reason", reason).field("retry_after", retry_after).finish()
            }
            Self::Answer { response, sources } => {
                f.debug_struct("Answer").field("response", response).field("sources", &sources.len()).finish()
            }
            Self::Streaming { sources, .. } => f.debug_struct("Streaming").field("sources", &sources.len()).finish(),
        }
    }
}
