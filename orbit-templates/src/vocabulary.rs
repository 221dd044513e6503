//! ABOUTME: Domain vocabulary (entity synonyms, action verbs) shared by indexing and reranking

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declared alongside a template library: synonyms feed into the embedding
/// text built for each template, and both maps feed the Intent Engine's
/// domain reranking boosts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainVocabulary {
    /// entity name -> synonyms, e.g. "customer" -> ["client", "account holder"]
    pub entity_synonyms: HashMap<String, Vec<String>>,
    /// action name -> verbs that express it, e.g. "list" -> ["show", "get", "find"]
    pub action_verbs: HashMap<String, Vec<String>>,
}

impl DomainVocabulary {
    #[must_use]
    pub fn synonyms_for(&self, entity: &str) -> &[String] {
        self.entity_synonyms.get(entity).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn verbs_for(&self, action: &str) -> &[String] {
        self.action_verbs.get(action).map_or(&[], Vec::as_slice)
    }
}
