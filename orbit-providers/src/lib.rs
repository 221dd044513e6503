//! ABOUTME: LLM inference and embedding provider abstraction
//! ABOUTME: Capability-detected, hot-swappable backends behind two narrow traits

pub mod abstraction;
pub mod embedding;
pub mod inference;
mod manager;
mod openai_embedding;
mod rig_provider;

pub use abstraction::{ProviderCapabilities, ProviderConfig};
pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use inference::{CompletionChunk, CompletionRequest, CompletionStream, InferenceProvider};
pub use manager::{EmbeddingProviderManager, InferenceProviderManager};
pub use openai_embedding::{create_openai_embedding_provider, OpenAiEmbeddingProvider};
pub use rig_provider::{create_rig_provider, RigInferenceProvider};
