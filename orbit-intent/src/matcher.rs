//! ABOUTME: Template matching - embed, search, domain rerank, Jaccard fallback, confidence gate

use std::collections::HashSet;
use std::sync::Arc;

use orbit_providers::EmbeddingProvider;
use orbit_templates::{Template, TemplateStore};
use tracing::warn;

/// A matched template plus its final (post-boost, capped) similarity.
pub struct MatchOutcome {
    pub template: Template,
    pub similarity: f32,
}

#[derive(Clone)]
pub struct TemplateMatcher {
    store: Arc<TemplateStore>,
    embedding: Arc<dyn EmbeddingProvider>,
    max_templates: usize,
    confidence_threshold: f32,
}

impl TemplateMatcher {
    #[must_use]
    pub fn new(store: Arc<TemplateStore>, embedding: Arc<dyn EmbeddingProvider>, max_templates: usize, confidence_threshold: f32) -> Self {
        Self { store, embedding, max_templates, confidence_threshold }
    }

    /// Runs the full match pipeline and returns the accepted template, or
    /// `None` if nothing clears `confidence_threshold`.
    pub async fn match_query(&self, query: &str) -> Option<MatchOutcome> {
        let candidates = match self.embedding.embed(&[query.to_string()]).await {
            Ok(mut vectors) => {
                let query_vector = vectors.pop().unwrap_or_default();
                match self.store.search(&query_vector, self.max_templates).await {
                    Ok(hits) => hits,
                    Err(e) => {
                        warn!(error = %e, "template vector search failed, falling back to Jaccard");
                        self.jaccard_candidates(query)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "query embedding failed, falling back to Jaccard");
                self.jaccard_candidates(query)
            }
        };

        let reranked = candidates
            .into_iter()
            .map(|(template, similarity)| {
                let boosted = self.apply_domain_boost(query, &template, similarity.max(0.0));
                (template, boosted)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        if reranked.1 >= self.confidence_threshold {
            Some(MatchOutcome { template: reranked.0, similarity: reranked.1 })
        } else {
            None
        }
    }

    fn jaccard_candidates(&self, query: &str) -> Vec<(Template, f32)> {
        let query_tokens = tokenize(query);
        self.store
            .list_templates()
            .into_iter()
            .map(|template| {
                let text = orbit_templates::embedding_text(&template, self.store.vocabulary());
                let score = jaccard_similarity(&query_tokens, &tokenize(&text));
                (template, score)
            })
            .collect()
    }

    /// +0.20 if the query mentions the primary entity or one of its
    /// synonyms; +0.15 if it contains an action verb mapped to the
    /// template's action. Capped at 1.0.
    fn apply_domain_boost(&self, query: &str, template: &Template, similarity: f32) -> f32 {
        let lower = query.to_lowercase();
        let vocabulary = self.store.vocabulary();
        let mut boosted = similarity;

        let entity = &template.semantic_tags.primary_entity;
        if lower.contains(&entity.to_lowercase())
            || vocabulary.synonyms_for(entity).iter().any(|s| lower.contains(&s.to_lowercase()))
        {
            boosted += 0.20;
        }

        if vocabulary.verbs_for(&template.semantic_tags.action).iter().any(|v| lower.contains(&v.to_lowercase())) {
            boosted += 0.15;
        }

        boosted.min(1.0)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_similarity_of_identical_sets_is_one() {
        let a: HashSet<String> = ["orders", "list"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_similarity_of_disjoint_sets_is_zero() {
        let a: HashSet<String> = ["orders"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["invoices"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
    }

    #[test]
    fn empty_set_yields_zero_rather_than_panicking() {
        let a: HashSet<String> = HashSet::new();
        let b: HashSet<String> = ["x"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
    }
}
