//! ABOUTME: TemplateStore - canonical records in-memory, embeddings in the Vector Store abstraction

use std::sync::Arc;

use dashmap::DashMap;
use orbit_core::GatewayError;
use orbit_providers::EmbeddingProvider;
use orbit_vectorstore::{VectorRecord, VectorStore};

use crate::template::Template;
use crate::vocabulary::DomainVocabulary;

/// Builds the text embedded for a template: a normalized concatenation of
/// description, nl_examples, tags, parameter names, semantic tag fields,
/// and any declared synonyms for the primary entity.
#[must_use]
pub fn embedding_text(template: &Template, vocabulary: &DomainVocabulary) -> String {
    let mut parts = vec![template.description.clone()];
    parts.extend(template.nl_examples.iter().cloned());
    parts.extend(template.tags.iter().cloned());
    parts.extend(template.parameters.iter().map(|p| p.name.clone()));
    parts.push(template.semantic_tags.action.clone());
    parts.push(template.semantic_tags.primary_entity.clone());
    if let Some(secondary) = &template.semantic_tags.secondary_entity {
        parts.push(secondary.clone());
    }
    parts.extend(template.semantic_tags.qualifiers.iter().cloned());
    parts.extend(vocabulary.synonyms_for(&template.semantic_tags.primary_entity).iter().cloned());

    parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Persists the Template entity and exposes semantic search over its
/// embedding index. The vector store's `collection` holds one vector per
/// template id; `records` is the canonical, authoritative copy.
pub struct TemplateStore {
    vector_store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingProvider>,
    collection: String,
    vocabulary: DomainVocabulary,
    records: DashMap<String, Template>,
}

impl TemplateStore {
    #[must_use]
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
        vocabulary: DomainVocabulary,
    ) -> Self {
        Self { vector_store, embedding, collection: collection.into(), vocabulary, records: DashMap::new() }
    }

    #[must_use]
    pub fn vocabulary(&self) -> &DomainVocabulary {
        &self.vocabulary
    }

    /// Embeds and indexes `template`, replacing any prior record and
    /// vector under the same id.
    pub async fn add_template(&self, template: Template) -> Result<(), GatewayError> {
        let text = embedding_text(&template, &self.vocabulary);
        let vectors = self.embedding.embed(&[text]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| GatewayError::internal("embedding returned no vector"))?;

        self.vector_store
            .insert(
                &self.collection,
                vec![VectorRecord { id: template.id.clone(), vector, metadata: serde_json::json!({ "id": template.id }) }],
            )
            .await?;

        self.records.insert(template.id.clone(), template);
        Ok(())
    }

    #[must_use]
    pub fn get_template(&self, id: &str) -> Option<Template> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Re-embeds the existing record under `id`, replacing its vector.
    pub async fn reindex(&self, id: &str) -> Result<(), GatewayError> {
        let template = self.get_template(id).ok_or_else(|| GatewayError::internal(format!("unknown template '{id}'")))?;
        self.add_template(template).await
    }

    /// Top-`k` nearest templates by embedding similarity, paired with the
    /// backend's reported similarity score. Callers apply domain reranking
    /// and the confidence threshold on top of this.
    pub async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(Template, f32)>, GatewayError> {
        let hits = self.vector_store.search(&self.collection, query_embedding, k).await?;
        Ok(hits.into_iter().filter_map(|hit| self.get_template(&hit.id).map(|t| (t, hit.score))).collect())
    }

    #[must_use]
    pub fn list_templates(&self) -> Vec<Template> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    #[must_use]
    pub fn embedding_model_name(&self) -> &str {
        self.embedding.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ResultFormat, SemanticTags};
    use async_trait::async_trait;
    use orbit_vectorstore::LocalVectorStore;

    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedding {
        fn name(&self) -> &str {
            "stub"
        }
        fn model(&self) -> &str {
            "stub-model"
        }
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 0.0, 1.0]).collect())
        }
        async fn validate(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn sample_template(id: &str) -> Template {
        Template {
            id: id.to_string(),
            description: "list customer orders".to_string(),
            nl_examples: vec!["show orders for customer 5".to_string()],
            tags: vec!["orders".to_string()],
            semantic_tags: SemanticTags {
                action: "list".to_string(),
                primary_entity: "order".to_string(),
                secondary_entity: None,
                qualifiers: vec![],
            },
            parameters: vec![],
            operation_template: "SELECT * FROM orders WHERE customer_id = %(customer_id)s".to_string(),
            result_format: ResultFormat::List,
            display_fields: None,
        }
    }

    fn store(dir: &std::path::Path) -> TemplateStore {
        let vector_store = Arc::new(LocalVectorStore::new("local", dir.join("templates.db"), 3, 100));
        TemplateStore::new(vector_store, Arc::new(StubEmbedding), "templates", DomainVocabulary::default())
    }

    #[tokio::test]
    async fn add_then_get_returns_the_canonical_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.add_template(sample_template("orders.list")).await.unwrap();
        assert!(store.get_template("orders.list").is_some());
    }

    #[tokio::test]
    async fn reindex_replaces_the_vector_for_the_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.add_template(sample_template("orders.list")).await.unwrap();
        store.reindex("orders.list").await.unwrap();
        assert_eq!(store.list_templates().len(), 1);
    }

    #[tokio::test]
    async fn search_pairs_hits_back_to_canonical_templates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.add_template(sample_template("orders.list")).await.unwrap();

        let query = store.embedding.embed(&["orders".to_string()]).await.unwrap().remove(0);
        let results = store.search(&query, 5).await.unwrap();
        assert_eq!(results[0].0.id, "orders.list");
    }

    #[test]
    fn embedding_text_includes_synonyms_for_the_primary_entity() {
        let mut vocab = DomainVocabulary::default();
        vocab.entity_synonyms.insert("order".to_string(), vec!["purchase".to_string()]);
        let text = embedding_text(&sample_template("orders.list"), &vocab);
        assert!(text.contains("purchase"));
    }
}
