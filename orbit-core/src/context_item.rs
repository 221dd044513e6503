//! ABOUTME: ContextItem - one unit of retrieved evidence handed to the LLM
//! ABOUTME: Confidence is monotone: higher means more relevant, callers may filter by threshold

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One unit of evidence supplied to the LLM.
///
/// `confidence` is always in `[0, 1]`; a retriever must drop items below its
/// configured `relevance_threshold` before returning them (see the Intent
/// Retrieval Engine and non-intent retrievers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    confidence: f32,

    pub raw_document: Option<serde_json::Value>,
    pub source_adapter: Option<String>,
    pub source_url: Option<String>,
    pub chunk_id: Option<String>,
}

impl ContextItem {
    /// Construct a new item, clamping confidence into `[0, 1]`.
    #[must_use]
    pub fn new(content: impl Into<String>, confidence: f32) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            confidence: confidence.clamp(0.0, 1.0),
            raw_document: None,
            source_adapter: None,
            source_url: None,
            chunk_id: None,
        }
    }

    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_source_adapter(mut self, name: impl Into<String>) -> Self {
        self.source_adapter = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    #[must_use]
    pub fn with_raw_document(mut self, raw: serde_json::Value) -> Self {
        self.raw_document = Some(raw);
        self
    }

    /// A zero-confidence marker item, used when a retriever finds nothing
    /// worth returning (e.g. no matching template) but must still produce a
    /// value for the orchestrator to interpret.
    #[must_use]
    pub fn marker(content: impl Into<String>, reason_key: &'static str) -> Self {
        let mut item = Self::new(content, 0.0);
        item.metadata
            .insert(reason_key.to_string(), serde_json::Value::Bool(true));
        item
    }

    #[must_use]
    pub fn is_below_threshold(&self, relevance_threshold: f32) -> bool {
        self.confidence < relevance_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_clamps_to_unit_interval() {
        assert_eq!(ContextItem::new("x", 1.5).confidence(), 1.0);
        assert_eq!(ContextItem::new("x", -0.5).confidence(), 0.0);
        assert_eq!(ContextItem::new("x", 0.42).confidence(), 0.42);
    }

    #[test]
    fn marker_carries_reason_metadata() {
        let item = ContextItem::marker("no match", "no_matching_template");
        assert_eq!(item.confidence(), 0.0);
        assert_eq!(
            item.metadata.get("no_matching_template"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn threshold_check_is_strict_less_than() {
        let item = ContextItem::new("x", 0.5);
        assert!(item.is_below_threshold(0.6));
        assert!(!item.is_below_threshold(0.5));
    }
}
