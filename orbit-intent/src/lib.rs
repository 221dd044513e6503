//! ABOUTME: Intent Retrieval Engine (C4) - match -> extract -> execute -> shape, as one Adapter

pub mod backend;
pub mod extraction;
pub mod matcher;
pub mod shaping;

use std::sync::Arc;

use async_trait::async_trait;
use orbit_core::{Adapter, ContextItem, GatewayError, RetrieveOptions};
use orbit_providers::InferenceProvider;

pub use backend::ExecutionBackend;
pub use matcher::{MatchOutcome, TemplateMatcher};

/// Wires template matching, parameter extraction, operation execution, and
/// response shaping into one retrieval component.
pub struct IntentEngine {
    name: String,
    matcher: TemplateMatcher,
    inference: Arc<dyn InferenceProvider>,
    backend: ExecutionBackend,
}

impl IntentEngine {
    #[must_use]
    pub fn new(name: impl Into<String>, matcher: TemplateMatcher, inference: Arc<dyn InferenceProvider>, backend: ExecutionBackend) -> Self {
        Self { name: name.into(), matcher, inference, backend }
    }
}

#[async_trait]
impl Adapter for IntentEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, query: &str, _options: &RetrieveOptions) -> Result<Vec<ContextItem>, GatewayError> {
        let Some(outcome) = self.matcher.match_query(query).await else {
            return Ok(vec![ContextItem::marker("no template matched this query", "no_matching_template")]);
        };

        let MatchOutcome { template, similarity } = outcome;

        let parameters = match extraction::resolve_parameters(query, &template.parameters, self.inference.as_ref()).await {
            Ok(params) => params,
            Err(problems) => {
                let mut item = ContextItem::new(format!("parameter resolution failed: {}", problems.join("; ")), 0.0);
                item.metadata.insert("success".to_string(), serde_json::Value::Bool(false));
                item.metadata.insert(
                    "template_id".to_string(),
                    serde_json::Value::String(template.id.clone()),
                );
                return Ok(vec![item]);
            }
        };

        let rows = backend::execute(&self.backend, &template, &parameters).await?;
        Ok(vec![shaping::shape_result(&template, rows, &parameters, similarity)])
    }
}
