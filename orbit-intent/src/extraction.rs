//! ABOUTME: Parameter extraction - pattern rules, then LLM fallback, then defaults, then validation

use std::collections::HashMap;
use std::sync::OnceLock;

use orbit_core::GatewayError;
use orbit_providers::{CompletionRequest, InferenceProvider};
use orbit_templates::{ParameterSpec, ParameterType};
use regex::Regex;
use serde_json::Value;

/// Named time periods recognized before falling back to the `N day/week/month` pattern.
const NAMED_PERIODS: &[(&str, i64)] = &[("yesterday", 1), ("today", 0), ("last week", 7), ("last month", 30)];

fn integer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+\b").unwrap())
}

fn decimal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?\d+(\.\d{2})?").unwrap())
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap())
}

fn period_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(day|week|month)s?").unwrap())
}

/// `last N days/weeks/months` -> integer days, or a recognized named phrase.
fn extract_named_period_days(query: &str) -> Option<i64> {
    let lower = query.to_lowercase();
    for (phrase, days) in NAMED_PERIODS {
        if lower.contains(phrase) {
            return Some(*days);
        }
    }
    let caps = period_count_regex().captures(query)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    Some(match unit.as_str() {
        "week" => n * 7,
        "month" => n * 30,
        _ => n,
    })
}

/// Cheap, deterministic type-driven regex extraction, tried before LLM extraction.
/// Returns `None` when nothing plausible is found; the caller moves on to
/// LLM extraction for required parameters still missing.
#[must_use]
pub fn pattern_extract(query: &str, param: &ParameterSpec) -> Option<Value> {
    if let Some(allowed) = &param.allowed_values {
        let lower = query.to_lowercase();
        return allowed
            .iter()
            .find(|v| v.as_str().is_some_and(|s| lower.contains(&s.to_lowercase())))
            .cloned();
    }

    match param.param_type {
        ParameterType::Integer => {
            if let Some(days) = extract_named_period_days(query) {
                return Some(Value::from(days));
            }
            integer_regex().find(query).and_then(|m| m.as_str().parse::<i64>().ok()).map(Value::from)
        }
        ParameterType::Number => decimal_regex()
            .find(query)
            .and_then(|m| m.as_str().trim_start_matches('$').parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ParameterType::Date => date_regex().find(query).map(|m| Value::String(m.as_str().to_string())),
        ParameterType::String if param.name.to_lowercase().contains("email") => {
            email_regex().find(query).map(|m| Value::String(m.as_str().to_string()))
        }
        ParameterType::Boolean => {
            let lower = query.to_lowercase();
            if lower.contains("true") || lower.contains("yes") {
                Some(Value::Bool(true))
            } else if lower.contains("false") || lower.contains("no") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        ParameterType::String | ParameterType::Array => None,
    }
}

/// Composes a single structured prompt for every still-missing parameter
/// and asks the LLM to return one JSON object with those keys (spec
/// 4.3.2 step 2). Temperature is forced to `<= 0.1`.
pub async fn llm_extract(
    inference: &dyn InferenceProvider,
    query: &str,
    missing: &[&ParameterSpec],
) -> Result<HashMap<String, Value>, GatewayError> {
    if missing.is_empty() {
        return Ok(HashMap::new());
    }

    let mut prompt = String::new();
    prompt.push_str("Extract the following parameters from the user request below. ");
    prompt.push_str("Respond with a single JSON object whose keys are exactly the parameter names. ");
    prompt.push_str("Use null for any parameter you cannot find.\n\n");
    for param in missing {
        prompt.push_str(&format!("- {} ({:?}): {}", param.name, param.param_type, param.description));
        if let Some(allowed) = &param.allowed_values {
            prompt.push_str(&format!(" allowed values: {allowed:?}"));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("\nUser request: {query}\n"));

    let response = inference.complete(&CompletionRequest::new(prompt).with_temperature(0.1)).await?;
    let json_text = first_balanced_object(&response).ok_or_else(|| {
        GatewayError::internal("LLM parameter extraction did not return a JSON object")
    })?;

    let parsed: Value = serde_json::from_str(&json_text)
        .map_err(|e| GatewayError::internal(format!("failed to parse extraction JSON: {e}")))?;

    let mut out = HashMap::new();
    if let Value::Object(map) = parsed {
        for param in missing {
            if let Some(value) = map.get(&param.name) {
                if !value.is_null() {
                    out.insert(param.name.clone(), value.clone());
                }
            }
        }
    }
    Ok(out)
}

/// Finds the first balanced `{...}` substring, tolerating any prose the
/// model wraps its JSON in.
fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (idx, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + idx + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Validates `value` against `param`'s type and `validation_rules` (spec
/// 4.3.2 "Validation"). Returns a human-readable reason on failure.
pub fn validate_value(param: &ParameterSpec, value: &Value) -> Result<(), String> {
    let type_ok = match param.param_type {
        ParameterType::Integer => value.is_i64() || value.is_u64() || value.as_str().is_some_and(|s| s.parse::<i64>().is_ok()),
        ParameterType::Number => value.is_number() || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok()),
        ParameterType::Boolean => value.is_boolean(),
        ParameterType::Array => value.is_array(),
        ParameterType::String | ParameterType::Date => value.is_string(),
    };
    if !type_ok {
        return Err(format!("parameter '{}' expected type {:?}, got {value}", param.name, param.param_type));
    }

    if let Some(allowed) = &param.allowed_values {
        if !allowed.contains(value) {
            return Err(format!("parameter '{}' value {value} is not one of the allowed values", param.name));
        }
    }

    if let Some(rules) = &param.validation_rules {
        if let Some(n) = value.as_f64() {
            if let Some(min) = rules.min {
                if n < min {
                    return Err(format!("parameter '{}' value {n} is below minimum {min}", param.name));
                }
            }
            if let Some(max) = rules.max {
                if n > max {
                    return Err(format!("parameter '{}' value {n} is above maximum {max}", param.name));
                }
            }
        }
        if let Some(s) = value.as_str() {
            if let Some(length) = rules.length {
                if s.len() != length {
                    return Err(format!("parameter '{}' value must be exactly {length} characters", param.name));
                }
            }
            if let Some(pattern) = &rules.pattern {
                let re = Regex::new(pattern).map_err(|e| format!("invalid validation pattern for '{}': {e}", param.name))?;
                if !re.is_match(s) {
                    return Err(format!("parameter '{}' value does not match required pattern", param.name));
                }
            }
        }
    }

    Ok(())
}

/// Resolves every declared parameter through pattern extraction, then LLM
/// extraction for whatever required parameters remain missing, then
/// defaults, validating each resolved value. Returns the resolved map, or
/// the list of human-readable problems if any required parameter is still
/// missing or any value fails validation.
pub async fn resolve_parameters(
    query: &str,
    parameters: &[ParameterSpec],
    inference: &dyn InferenceProvider,
) -> Result<HashMap<String, Value>, Vec<String>> {
    let mut resolved: HashMap<String, Value> = HashMap::new();

    for param in parameters {
        if let Some(value) = pattern_extract(query, param) {
            resolved.insert(param.name.clone(), value);
        }
    }

    let missing_required: Vec<&ParameterSpec> =
        parameters.iter().filter(|p| p.required && !resolved.contains_key(&p.name)).collect();

    if !missing_required.is_empty() {
        match llm_extract(inference, query, &missing_required).await {
            Ok(extracted) => resolved.extend(extracted),
            Err(e) => tracing::warn!(error = %e, "LLM parameter extraction failed"),
        }
    }

    for param in parameters {
        if !resolved.contains_key(&param.name) {
            if let Some(default) = &param.default {
                resolved.insert(param.name.clone(), default.clone());
            }
        }
    }

    let mut problems = Vec::new();
    for param in parameters {
        match resolved.get(&param.name) {
            Some(value) => {
                if let Err(reason) = validate_value(param, value) {
                    problems.push(reason);
                }
            }
            None if param.required => problems.push(format!("required parameter '{}' is missing", param.name)),
            None => {}
        }
    }

    if problems.is_empty() {
        Ok(resolved)
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_templates::ValidationRules;

    fn int_param(name: &str) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            param_type: ParameterType::Integer,
            required: true,
            default: None,
            description: "an id".to_string(),
            allowed_values: None,
            example: None,
            location: None,
            graphql_type: None,
            validation_rules: None,
        }
    }

    #[test]
    fn pattern_extract_finds_a_bare_integer() {
        let param = int_param("customer_id");
        assert_eq!(pattern_extract("show orders for customer 42", &param), Some(Value::from(42)));
    }

    #[test]
    fn pattern_extract_resolves_named_time_periods_to_days() {
        let mut param = int_param("window_days");
        param.param_type = ParameterType::Integer;
        assert_eq!(pattern_extract("orders from last week", &param), Some(Value::from(7)));
        assert_eq!(pattern_extract("orders from last 3 weeks", &param), Some(Value::from(21)));
        assert_eq!(pattern_extract("orders from yesterday", &param), Some(Value::from(1)));
    }

    #[test]
    fn pattern_extract_matches_iso_dates() {
        let mut param = int_param("since");
        param.param_type = ParameterType::Date;
        assert_eq!(pattern_extract("orders since 2024-01-15", &param), Some(Value::String("2024-01-15".to_string())));
    }

    #[test]
    fn pattern_extract_matches_allowed_values_by_substring() {
        let mut param = int_param("status");
        param.param_type = ParameterType::String;
        param.allowed_values = Some(vec![Value::from("open"), Value::from("closed")]);
        assert_eq!(pattern_extract("show closed orders", &param), Some(Value::from("closed")));
    }

    #[test]
    fn validate_value_rejects_out_of_range_numbers() {
        let mut param = int_param("limit");
        param.validation_rules = Some(ValidationRules { min: Some(1.0), max: Some(100.0), pattern: None, length: None });
        assert!(validate_value(&param, &Value::from(500)).is_err());
        assert!(validate_value(&param, &Value::from(50)).is_ok());
    }

    #[test]
    fn validate_value_rejects_values_outside_allowed_set() {
        let mut param = int_param("status");
        param.param_type = ParameterType::String;
        param.allowed_values = Some(vec![Value::from("open")]);
        assert!(validate_value(&param, &Value::from("closed")).is_err());
    }

    #[test]
    fn first_balanced_object_extracts_json_from_surrounding_prose() {
        let text = "Sure, here it is: {\"a\": 1, \"b\": {\"c\": 2}} - done.";
        let extracted = first_balanced_object(text).unwrap();
        assert_eq!(extracted, "{\"a\": 1, \"b\": {\"c\": 2}}");
    }

    #[tokio::test]
    async fn resolve_parameters_reports_missing_required_as_a_problem() {
        struct Stub {
            caps: orbit_providers::ProviderCapabilities,
        }
        #[async_trait::async_trait]
        impl InferenceProvider for Stub {
            fn name(&self) -> &str {
                "stub"
            }
            fn model(&self) -> &str {
                "stub"
            }
            fn capabilities(&self) -> &orbit_providers::ProviderCapabilities {
                &self.caps
            }
            async fn complete(&self, _request: &CompletionRequest) -> Result<String, GatewayError> {
                Ok("{\"customer_id\": null}".to_string())
            }
            async fn validate(&self) -> Result<(), GatewayError> {
                Ok(())
            }
        }

        let stub = Stub { caps: orbit_providers::ProviderCapabilities::default() };
        let params = vec![int_param("customer_id")];
        let err = resolve_parameters("tell me about orders", &params, &stub).await.unwrap_err();
        assert!(err[0].contains("customer_id"));
    }
}
