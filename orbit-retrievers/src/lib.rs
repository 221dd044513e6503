//! ABOUTME: Non-intent Adapter implementations (C5) plus the adapter instance cache/registry
//! ABOUTME: Direct retrieval over one collection - no template matching, no parameter extraction

pub mod file_chunks;
pub mod mongo_direct;
pub mod registry;
pub mod similarity;

pub use file_chunks::{ChunkInput, FileChunksAdapter};
pub use mongo_direct::MongoDirectAdapter;
pub use registry::{AdapterFactory, AdapterRegistry, ReloadSummary};
pub use similarity::VectorSimilarityAdapter;
