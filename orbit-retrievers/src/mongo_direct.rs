//! ABOUTME: Keyword/metadata retrieval straight against a Mongo collection, no intent matching
//! ABOUTME: Builds a regex $or filter over configured text fields; scores hits by token overlap

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use orbit_core::{Adapter, ContextItem, GatewayError, RetrieveOptions};
use orbit_datasources::MongoClient;
use serde_json::Value;

const DEFAULT_LIMIT: i64 = 10;

/// Direct keyword search over one Mongo collection's configured text fields,
/// with an optional fixed metadata filter layered on top.
pub struct MongoDirectAdapter {
    name: String,
    client: Arc<MongoClient>,
    collection: String,
    search_fields: Vec<String>,
    metadata_filter: bson::Document,
    relevance_threshold: f32,
    max_limit: i64,
}

impl MongoDirectAdapter {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        client: Arc<MongoClient>,
        collection: impl Into<String>,
        search_fields: Vec<String>,
        metadata_filter: bson::Document,
        relevance_threshold: f32,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            collection: collection.into(),
            search_fields,
            metadata_filter,
            relevance_threshold,
            max_limit: DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_max_limit(mut self, max_limit: i64) -> Self {
        self.max_limit = max_limit;
        self
    }

    fn build_filter(&self, query: &str) -> bson::Document {
        build_search_filter(&self.metadata_filter, &self.search_fields, query)
    }

    fn score(&self, query_tokens: &HashSet<String>, row: &Value) -> f32 {
        let text: String = self
            .search_fields
            .iter()
            .filter_map(|f| row.get(f).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        jaccard_similarity(query_tokens, &tokenize(&text))
    }
}

#[async_trait]
impl Adapter for MongoDirectAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<ContextItem>, GatewayError> {
        let limit = options.limit.map(|l| l as i64).unwrap_or(self.max_limit);
        let filter = self.build_filter(query);
        let rows = self
            .client
            .find(&self.collection, filter, None, None, Some(limit), None, self.max_limit)
            .await?;

        let query_tokens = tokenize(query);
        let items: Vec<ContextItem> = rows
            .into_iter()
            .map(|row| (self.score(&query_tokens, &row), row))
            .filter(|(score, _)| *score >= self.relevance_threshold)
            .map(|(score, row)| {
                ContextItem::new(row.to_string(), score)
                    .with_raw_document(row)
                    .with_source_adapter(self.name.clone())
            })
            .collect();

        Ok(items)
    }
}

/// Layers a case-insensitive regex `$or` over `search_fields` on top of a
/// fixed `metadata_filter`; returns `metadata_filter` unchanged if there are
/// no search fields or the query is blank.
fn build_search_filter(metadata_filter: &bson::Document, search_fields: &[String], query: &str) -> bson::Document {
    let mut filter = metadata_filter.clone();
    if search_fields.is_empty() || query.trim().is_empty() {
        return filter;
    }

    let pattern = regex::escape(query.trim());
    let clauses: Vec<bson::Bson> = search_fields
        .iter()
        .map(|field| bson::Bson::Document(bson::doc! { field: { "$regex": pattern.clone(), "$options": "i" } }))
        .collect();
    filter.insert("$or", clauses);
    filter
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
    fn build_filter_combines_metadata_and_text_search() {
        let filter = build_search_filter(&bson::doc! { "archived": false }, &["title".to_string()], "widget order");
        assert_eq!(filter.get_bool("archived").unwrap(), false);
        assert!(filter.contains_key("$or"));
    }

    #[test]
    fn build_filter_skips_or_clause_for_blank_query() {
        let filter = build_search_filter(&bson::doc! {}, &["title".to_string()], "   ");
        assert!(!filter.contains_key("$or"));
    }

    #[test]
    fn jaccard_similarity_of_disjoint_sets_is_zero() {
        let a: HashSet<String> = ["a".to_string()].into();
        let b: HashSet<String> = ["b".to_string()].into();
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
    }
}
