//! ABOUTME: GraphQL envelope over the shared HTTP pool - {query, variables, operationName}
//! ABOUTME: GraphQL-level errors[] are surfaced even on HTTP 200

use std::collections::HashMap;

use orbit_core::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{HttpClient, HttpRequestSpec};

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct GraphQlResponse {
    pub data: Option<Value>,
    pub errors: Vec<GraphQlError>,
}

pub struct GraphQlClient {
    http: HttpClient,
    endpoint: String,
}

impl GraphQlClient {
    #[must_use]
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self { http, endpoint: endpoint.into() }
    }

    pub async fn execute(&self, request: &GraphQlRequest) -> Result<GraphQlResponse, GatewayError> {
        let body = serde_json::to_value(request)
            .map_err(|e| GatewayError::internal(format!("failed to serialize graphql request: {e}")))?;

        let spec = HttpRequestSpec {
            method: "POST".to_string(),
            url: self.endpoint.clone(),
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            query: HashMap::new(),
            body: Some(body),
        };

        let response = self.http.send(&spec).await?;
        if response.status >= 400 {
            return Err(GatewayError::backend("graphql", format!("http {}: {}", response.status, response.body)));
        }

        let data = response.body.get("data").cloned();
        let errors = response
            .body
            .get("errors")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| serde_json::from_value::<GraphQlError>(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(GraphQlResponse { data, errors })
    }
}

/// Coerces an extracted parameter value to the declared GraphQL scalar
/// type, stripping `!` (non-null) and `[...]` (list) wrapper syntax before
/// inspecting the base type name.
#[must_use]
pub fn coerce_variable(value: &Value, graphql_type: &str) -> Value {
    let base = graphql_type.trim_end_matches('!').trim_start_matches('[').trim_end_matches(']').trim_end_matches('!');

    match base {
        "Int" | "ID" => match value {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or_else(|_| value.clone()),
            Value::Number(n) if n.is_f64() => Value::from(n.as_f64().unwrap_or(0.0) as i64),
            other => other.clone(),
        },
        "Float" => match value {
            Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or_else(|_| value.clone()),
            other => other.clone(),
        },
        "Boolean" => match value {
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => value.clone(),
            },
            other => other.clone(),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_limit_coerces_to_numeric_int_for_int_bang_type() {
        let coerced = coerce_variable(&json!("5"), "Int!");
        assert_eq!(coerced, json!(5));
        assert!(coerced.is_number());
    }

    #[test]
    fn list_and_bang_wrappers_are_stripped_before_type_check() {
        assert_eq!(coerce_variable(&json!("3.5"), "[Float!]!"), json!(3.5));
    }

    #[test]
    fn string_type_passes_through_unchanged() {
        assert_eq!(coerce_variable(&json!("hello"), "String"), json!("hello"));
    }
}
