//! ABOUTME: Operation execution - renders a template's operation_template, dispatches per backend family
//! ABOUTME: All five families converge on (rows: Vec<Value>, metadata)

use std::collections::HashMap;
use std::sync::Arc;

use orbit_core::GatewayError;
use orbit_datasources::graphql::coerce_variable;
use orbit_datasources::mongo::{json_to_document, normalize_sort};
use orbit_datasources::sql::ensure_like_wildcards;
use orbit_datasources::{GraphQlClient, GraphQlRequest, HttpClient, HttpRequestSpec, MongoClient, SqlClient};
use orbit_templates::{ParameterLocation, ParameterSpec, Template};
use regex::Regex;
use serde_json::Value;
use tera::Context;

/// One concrete backend an Intent-engine adapter is wired to. The "sql"
/// and "duckdb" families both implement [`SqlClient`] - the placeholder-rewrite
/// and file/in-memory precedence differences live entirely inside their
/// respective `orbit-datasources` clients.
pub enum ExecutionBackend {
    Sql(Arc<dyn SqlClient>),
    Mongo { client: Arc<MongoClient>, max_limit: i64 },
    Http { client: Arc<HttpClient>, endpoint: String, method: String },
    GraphQl(Arc<GraphQlClient>),
}

/// Renders `{% if param %}...{% endif %}` conditional blocks and `{{name}}`
/// placeholders against every declared parameter (missing ones inserted as
/// `null`, so they're defined-but-falsy rather than a Tera "undefined
/// variable" error).
pub fn render_conditionals(
    template: &str,
    params: &HashMap<String, Value>,
    declared: &[ParameterSpec],
) -> Result<String, GatewayError> {
    let mut ctx = Context::new();
    for param in declared {
        let value = params.get(&param.name).cloned().unwrap_or(Value::Null);
        ctx.insert(&param.name, &value);
    }
    tera::Tera::one_off(template, &ctx, false)
        .map_err(|e| GatewayError::internal(format!("operation template render failed: {e}")))
}

fn like_placeholder_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)like\s+%\(([a-zA-Z0-9_]+)\)s").unwrap())
}

/// Wraps any parameter referenced in a `LIKE %(name)s` position with `%`
/// wildcards if it doesn't already have one.
fn apply_like_wildcards(rendered: &str, params: &mut HashMap<String, Value>) {
    for caps in like_placeholder_regex().captures_iter(rendered) {
        let name = &caps[1];
        if let Some(Value::String(s)) = params.get(name) {
            let wrapped = ensure_like_wildcards(s);
            params.insert(name.to_string(), Value::String(wrapped));
        }
    }
}

/// Replaces every string value that is exactly `%(name)s` anywhere in a
/// parsed JSON document with the typed parameter value - the Mongo-family
/// analogue of SQL's named-placeholder binding, operating after JSON
/// parsing so types (numbers, booleans, nested documents) survive intact.
fn substitute_named_values(value: &mut Value, params: &HashMap<String, Value>) {
    match value {
        Value::String(s) => {
            if let Some(name) = s.strip_prefix("%(").and_then(|rest| rest.strip_suffix(")s")) {
                if let Some(replacement) = params.get(name) {
                    *value = replacement.clone();
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| substitute_named_values(v, params)),
        Value::Object(map) => map.values_mut().for_each(|v| substitute_named_values(v, params)),
        _ => {}
    }
}

/// Executes `template.operation_template` against `backend` with the
/// resolved, validated `params`. Returns raw rows ready for response
/// shaping.
pub async fn execute(
    backend: &ExecutionBackend,
    template: &Template,
    params: &HashMap<String, Value>,
) -> Result<Vec<Value>, GatewayError> {
    match backend {
        ExecutionBackend::Sql(client) => execute_sql(client.as_ref(), template, params).await,
        ExecutionBackend::Mongo { client, max_limit } => execute_mongo(client.as_ref(), template, params, *max_limit).await,
        ExecutionBackend::Http { client, endpoint, method } => {
            execute_http(client.as_ref(), endpoint, method, template, params).await
        }
        ExecutionBackend::GraphQl(client) => execute_graphql(client.as_ref(), template, params).await,
    }
}

async fn execute_sql(client: &dyn SqlClient, template: &Template, params: &HashMap<String, Value>) -> Result<Vec<Value>, GatewayError> {
    let rendered = render_conditionals(&template.operation_template, params, &template.parameters)?;
    let mut bind_params = params.clone();
    apply_like_wildcards(&rendered, &mut bind_params);

    let rows = client.query(&rendered, &bind_params).await?;
    Ok(rows.into_iter().map(Value::Object).collect())
}

async fn execute_mongo(
    client: &MongoClient,
    template: &Template,
    params: &HashMap<String, Value>,
    max_limit: i64,
) -> Result<Vec<Value>, GatewayError> {
    let rendered = render_conditionals(&template.operation_template, params, &template.parameters)?;
    let mut document: Value = serde_json::from_str(&rendered)
        .map_err(|e| GatewayError::internal(format!("mongo operation template is not valid JSON: {e}")))?;
    substitute_named_values(&mut document, params);

    let collection = document
        .get("collection")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::internal("mongo operation template missing 'collection'"))?
        .to_string();
    let query_type = document.get("query_type").and_then(Value::as_str).unwrap_or("find");

    match query_type {
        "count" => {
            let filter = document.get("filter").map(json_to_document).unwrap_or_default();
            let count = client.count(&collection, filter).await?;
            Ok(vec![serde_json::json!({ "count": count })])
        }
        "aggregate" => {
            let pipeline: Vec<bson::Document> = document
                .get("pipeline")
                .and_then(Value::as_array)
                .map(|stages| stages.iter().map(json_to_document).collect())
                .unwrap_or_default();
            client.aggregate(&collection, pipeline).await
        }
        _ => {
            let filter = document.get("filter").map(json_to_document).unwrap_or_default();
            let projection = document.get("projection").map(json_to_document);
            let sort = document.get("sort").and_then(normalize_sort);
            let limit = document.get("limit").and_then(Value::as_i64);
            let skip = document.get("skip").and_then(Value::as_i64);
            client.find(&collection, filter, projection, sort, limit, skip, max_limit).await
        }
    }
}

async fn execute_http(
    client: &HttpClient,
    endpoint: &str,
    method: &str,
    template: &Template,
    params: &HashMap<String, Value>,
) -> Result<Vec<Value>, GatewayError> {
    let rendered_endpoint = render_conditionals(endpoint, params, &template.parameters)?;

    let mut path_values = HashMap::new();
    let mut query = HashMap::new();
    let mut headers = HashMap::new();
    let mut body = serde_json::Map::new();

    for param in &template.parameters {
        let Some(value) = params.get(&param.name) else { continue };
        let as_string = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
        match param.location {
            Some(ParameterLocation::Path) => {
                path_values.insert(param.name.clone(), as_string);
            }
            Some(ParameterLocation::Query) => {
                query.insert(param.name.clone(), as_string);
            }
            Some(ParameterLocation::Header) => {
                headers.insert(param.name.clone(), as_string);
            }
            Some(ParameterLocation::Body) | None => {
                body.insert(param.name.clone(), value.clone());
            }
        }
    }

    let url = orbit_datasources::http::render_single_brace(&rendered_endpoint, &path_values);
    let spec = HttpRequestSpec {
        method: method.to_string(),
        url,
        headers,
        query,
        body: if body.is_empty() { None } else { Some(Value::Object(body)) },
    };

    let response = client.send(&spec).await?;
    if response.status >= 400 {
        return Err(GatewayError::backend("http", format!("http {}: {}", response.status, response.body)));
    }
    Ok(match response.body {
        Value::Array(items) => items,
        other => vec![other],
    })
}

async fn execute_graphql(client: &GraphQlClient, template: &Template, params: &HashMap<String, Value>) -> Result<Vec<Value>, GatewayError> {
    let mut variables = serde_json::Map::new();
    for param in &template.parameters {
        if let Some(value) = params.get(&param.name) {
            let graphql_type = param.graphql_type.as_deref().unwrap_or("String");
            variables.insert(param.name.clone(), coerce_variable(value, graphql_type));
        }
    }

    let request = GraphQlRequest {
        query: template.operation_template.clone(),
        variables: Value::Object(variables),
        operation_name: None,
    };

    let response = client.execute(&request).await?;
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(GatewayError::backend("graphql", messages.join("; ")));
    }
    Ok(match response.data {
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_templates::{ParameterType, ResultFormat, SemanticTags};

    fn param(name: &str, required: bool) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            param_type: ParameterType::Integer,
            required,
            default: None,
            description: String::new(),
            allowed_values: None,
            example: None,
            location: None,
            graphql_type: None,
            validation_rules: None,
        }
    }

    fn template(operation_template: &str, parameters: Vec<ParameterSpec>) -> Template {
        Template {
            id: "t".to_string(),
            description: String::new(),
            nl_examples: vec![],
            tags: vec![],
            semantic_tags: SemanticTags { action: "list".to_string(), primary_entity: "order".to_string(), secondary_entity: None, qualifiers: vec![] },
            parameters,
            operation_template: operation_template.to_string(),
            result_format: ResultFormat::List,
            display_fields: None,
        }
    }

    #[test]
    fn conditional_block_is_included_only_when_param_resolved() {
        let tpl = template(
            "SELECT * FROM orders WHERE 1=1 {% if status %}AND status = %(status)s{% endif %}",
            vec![param("status", false)],
        );
        let mut params = HashMap::new();
        let rendered = render_conditionals(&tpl.operation_template, &params, &tpl.parameters).unwrap();
        assert!(!rendered.contains("AND status"));

        params.insert("status".to_string(), Value::from("open"));
        let rendered = render_conditionals(&tpl.operation_template, &params, &tpl.parameters).unwrap();
        assert!(rendered.contains("AND status = %(status)s"));
    }

    #[test]
    fn like_wildcards_are_added_to_params_used_in_like_position() {
        let rendered = "SELECT * FROM customers WHERE name LIKE %(name)s";
        let mut params = HashMap::new();
        params.insert("name".to_string(), Value::from("acme"));
        apply_like_wildcards(rendered, &mut params);
        assert_eq!(params.get("name"), Some(&Value::from("%acme%")));
    }

    #[test]
    fn substitute_named_values_preserves_non_string_types() {
        let mut doc = serde_json::json!({ "filter": { "customer_id": "%(customer_id)s" } });
        let mut params = HashMap::new();
        params.insert("customer_id".to_string(), Value::from(42));
        substitute_named_values(&mut doc, &params);
        assert_eq!(doc["filter"]["customer_id"], Value::from(42));
    }
}
