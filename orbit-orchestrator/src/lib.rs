//! ABOUTME: Chat Orchestrator (C10) - the only caller-facing entry point that ties
//! ABOUTME: throttle, retrieval fan-out, prompt assembly and the LLM call together

mod orchestrator;
mod prompt;
mod types;

pub use orchestrator::{ChatOrchestrator, OrchestratorConfig};
pub use types::{ChatMessage, ChatOutcome, ChatRequest};
