//! ABOUTME: Response shaping - projects raw rows per result_format into one ContextItem

use orbit_core::ContextItem;
use orbit_templates::{ResultFormat, Template};
use serde_json::Value;

const MAX_FIELD_CHARS: usize = 500;
const TABLE_CELL_WIDTH: usize = 40;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max).collect();
        format!("{truncated}...")
    }
}

fn display_fields<'a>(template: &'a Template, row: &'a serde_json::Map<String, Value>) -> Vec<&'a str> {
    match &template.display_fields {
        Some(fields) => fields.iter().map(String::as_str).collect(),
        None => row.keys().filter(|k| !k.starts_with('_')).map(String::as_str).collect(),
    }
}

fn field_display_value(row: &serde_json::Map<String, Value>, field: &str) -> String {
    match row.get(field) {
        Some(Value::String(s)) => truncate(s, MAX_FIELD_CHARS),
        Some(other) => truncate(&other.to_string(), MAX_FIELD_CHARS),
        None => String::new(),
    }
}

fn render_list(template: &Template, rows: &[Value]) -> String {
    let mut out = String::new();
    for (idx, row) in rows.iter().enumerate() {
        let Some(obj) = row.as_object() else { continue };
        let fields = display_fields(template, obj);
        let parts: Vec<String> = fields.iter().map(|f| format!("{f}={}", field_display_value(obj, f))).collect();
        out.push_str(&format!("{}. {}\n", idx + 1, parts.join(", ")));
    }
    out
}

fn render_table(template: &Template, rows: &[Value]) -> String {
    let header_fields: Vec<String> = rows
        .first()
        .and_then(Value::as_object)
        .map(|obj| display_fields(template, obj).into_iter().map(str::to_string).collect())
        .unwrap_or_default();

    let mut out = String::new();
    out.push_str(&header_fields.join(" | "));
    out.push('\n');

    for row in rows {
        let Some(obj) = row.as_object() else { continue };
        let cells: Vec<String> = header_fields.iter().map(|f| truncate(&field_display_value(obj, f), TABLE_CELL_WIDTH)).collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    out
}

/// Formats `rows` per `template.result_format` and wraps the result into one
/// `ContextItem` carrying the template id, parameters used, and row count in
/// its metadata.
#[must_use]
pub fn shape_result(
    template: &Template,
    rows: Vec<Value>,
    parameters_used: &std::collections::HashMap<String, Value>,
    confidence: f32,
) -> ContextItem {
    let content = match template.result_format {
        ResultFormat::List => render_list(template, &rows),
        ResultFormat::Table => render_table(template, &rows),
        ResultFormat::Summary => rows.first().map(std::string::ToString::to_string).unwrap_or_default(),
    };

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("template_id".to_string(), Value::String(template.id.clone()));
    metadata.insert(
        "parameters_used".to_string(),
        Value::Object(parameters_used.clone().into_iter().collect()),
    );
    metadata.insert("row_count".to_string(), Value::from(rows.len()));
    metadata.insert("rows".to_string(), Value::Array(rows));

    ContextItem::new(content, confidence).with_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_templates::SemanticTags;

    fn template(result_format: ResultFormat, display_fields: Option<Vec<String>>) -> Template {
        Template {
            id: "orders.list".to_string(),
            description: String::new(),
            nl_examples: vec![],
            tags: vec![],
            semantic_tags: SemanticTags { action: "list".to_string(), primary_entity: "order".to_string(), secondary_entity: None, qualifiers: vec![] },
            parameters: vec![],
            operation_template: String::new(),
            result_format,
            display_fields,
        }
    }

    #[test]
    fn list_format_numbers_rows_and_lists_display_fields() {
        let tpl = template(ResultFormat::List, Some(vec!["id".to_string(), "status".to_string()]));
        let rows = vec![serde_json::json!({ "id": 1, "status": "open", "internal": "x" })];
        let item = shape_result(&tpl, rows, &std::collections::HashMap::new(), 0.9);
        assert!(item.content.starts_with("1. id=1, status=open"));
        assert!(!item.content.contains("internal"));
    }

    #[test]
    fn list_format_truncates_long_strings() {
        let tpl = template(ResultFormat::List, Some(vec!["note".to_string()]));
        let long = "x".repeat(600);
        let rows = vec![serde_json::json!({ "note": long })];
        let item = shape_result(&tpl, rows, &std::collections::HashMap::new(), 0.9);
        assert!(item.content.contains("..."));
        assert!(item.content.len() < 600);
    }

    #[test]
    fn table_format_emits_header_then_rows() {
        let tpl = template(ResultFormat::Table, Some(vec!["id".to_string()]));
        let rows = vec![serde_json::json!({ "id": 1 }), serde_json::json!({ "id": 2 })];
        let item = shape_result(&tpl, rows, &std::collections::HashMap::new(), 0.9);
        let mut lines = item.content.lines();
        assert_eq!(lines.next(), Some("id"));
        assert_eq!(lines.next(), Some("1"));
        assert_eq!(lines.next(), Some("2"));
    }

    #[test]
    fn summary_format_passes_first_row_verbatim() {
        let tpl = template(ResultFormat::Summary, None);
        let rows = vec![serde_json::json!({ "total": 42 })];
        let item = shape_result(&tpl, rows, &std::collections::HashMap::new(), 0.9);
        assert!(item.content.contains("42"));
    }

    #[test]
    fn metadata_carries_template_id_and_row_count() {
        let tpl = template(ResultFormat::List, None);
        let rows = vec![serde_json::json!({ "id": 1 })];
        let item = shape_result(&tpl, rows, &std::collections::HashMap::new(), 0.75);
        assert_eq!(item.metadata.get("template_id"), Some(&Value::String("orders.list".to_string())));
        assert_eq!(item.metadata.get("row_count"), Some(&Value::from(1)));
        assert_eq!(item.confidence(), 0.75);
    }
}
