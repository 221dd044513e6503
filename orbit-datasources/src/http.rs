//! ABOUTME: Pooled reqwest client shared by the HTTP and GraphQL operation families
//! ABOUTME: Retries 5xx and transport errors only, linear backoff, up to max_retries

use std::collections::HashMap;
use std::time::Duration;

use orbit_core::GatewayError;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(200),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

pub struct HttpClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Sends `spec`, retrying 5xx responses and transport errors with
    /// linearly increasing delay; a 4xx is returned as `Ok` with the body
    /// included so the caller can surface it as a failure with detail.
    pub async fn send(&self, spec: &HttpRequestSpec) -> Result<HttpResponse, GatewayError> {
        let method = reqwest::Method::from_bytes(spec.method.to_uppercase().as_bytes())
            .map_err(|_| GatewayError::config(format!("invalid http method '{}'", spec.method)))?;

        let mut attempt = 0u32;
        loop {
            let mut builder = self.client.request(method.clone(), &spec.url);
            for (key, value) in &spec.headers {
                builder = builder.header(key, value);
            }
            if !spec.query.is_empty() {
                builder = builder.query(&spec.query);
            }
            if let Some(body) = &spec.body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < self.config.max_retries {
                        attempt += 1;
                        warn!(url = %spec.url, status = status.as_u16(), attempt, "retrying after server error");
                        tokio::time::sleep(self.config.retry_base_delay * attempt).await;
                        continue;
                    }
                    let body: Value = response.json().await.unwrap_or(Value::Null);
                    return Ok(HttpResponse { status: status.as_u16(), body });
                }
                Err(err) if attempt < self.config.max_retries && (err.is_timeout() || err.is_connect()) => {
                    attempt += 1;
                    warn!(url = %spec.url, error = %err, attempt, "retrying after transport error");
                    tokio::time::sleep(self.config.retry_base_delay * attempt).await;
                }
                Err(err) => return Err(GatewayError::backend("http", err.to_string())),
            }
        }
    }
}

/// Renders `{name}` (direct substitution) placeholders found in `template`
/// against `values`. `{{name}}` templates are left untouched here - they go
/// through the configured template renderer one layer up.
#[must_use]
pub fn render_single_brace(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_brace_placeholders_are_substituted_directly() {
        let mut values = HashMap::new();
        values.insert("id".to_string(), "42".to_string());
        assert_eq!(render_single_brace("/customers/{id}/orders", &values), "/customers/42/orders");
    }

    #[test]
    fn double_brace_templates_are_left_untouched() {
        let values = HashMap::new();
        assert_eq!(render_single_brace("/customers/{{id}}/orders", &values), "/customers/{{id}}/orders");
    }
}
