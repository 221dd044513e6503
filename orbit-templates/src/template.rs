//! ABOUTME: The Template entity and its declared parameter/result shape

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Integer,
    Number,
    String,
    Boolean,
    Date,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
    pub allowed_values: Option<Vec<Value>>,
    pub example: Option<Value>,
    pub location: Option<ParameterLocation>,
    pub graphql_type: Option<String>,
    pub validation_rules: Option<ValidationRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticTags {
    pub action: String,
    pub primary_entity: String,
    pub secondary_entity: Option<String>,
    pub qualifiers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    List,
    Table,
    Summary,
}

/// A declarative NL -> operation mapping. Immutable once indexed under
/// `id`; re-indexing the same id replaces its embedding and record in
/// place (spec invariant: `id` is a primary key within the library).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub description: String,
    pub nl_examples: Vec<String>,
    pub tags: Vec<String>,
    pub semantic_tags: SemanticTags,
    pub parameters: Vec<ParameterSpec>,
    pub operation_template: String,
    pub result_format: ResultFormat,
    pub display_fields: Option<Vec<String>>,
}
