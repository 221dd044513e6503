//! ABOUTME: Generic SQL family (libsql/SQLite + PostgreSQL) behind one typed pool capability
//! ABOUTME: Named `%(name)s` placeholders are rewritten to each driver's native positional bind style

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orbit_core::GatewayError;
use serde_json::Value;
use tracing::{debug, warn};

pub type Row = serde_json::Map<String, Value>;

/// Capability every SQL-family pool exposes. Named placeholders are always
/// submitted to the driver using its native bind style - no string
/// interpolation of values is ever performed.
#[async_trait]
pub trait SqlClient: Send + Sync {
    fn name(&self) -> &str;

    /// Runs `statement` (containing zero or more `%(name)s` placeholders)
    /// bound to `params`, returning each row as a JSON object with
    /// driver-native types already converted to JSON-safe forms (decimals
    /// -> float, dates -> ISO-8601 string).
    async fn query(&self, statement: &str, params: &HashMap<String, Value>) -> Result<Vec<Row>, GatewayError>;

    async fn health_check(&self) -> Result<(), GatewayError>;
}

/// Scans `sql` for `%(name)s` placeholders left-to-right and rewrites them
/// to positional markers, producing a parallel argument list in textual
/// order. Used by every backend whose driver does not accept named binds
/// directly (Postgres's `$N`, DuckDB/SQLite's `?`).
///
/// A placeholder that appears more than once is rebound at each occurrence
/// (simplest correct behaviour; drivers that de-duplicate `$N` references
/// would need a smarter rewrite, which none of ORBIT's SQL backends require).
pub fn rewrite_named_placeholders(
    sql: &str,
    params: &HashMap<String, Value>,
    positional: impl Fn(usize) -> String,
) -> Result<(String, Vec<Value>), GatewayError> {
    let mut out = String::with_capacity(sql.len());
    let mut args = Vec::new();
    let bytes = sql.as_bytes();
    let mut i = 0;
    let mut ordinal = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'%' && sql[i..].starts_with("%(") {
            if let Some(close) = sql[i..].find(")s") {
                let name = &sql[i + 2..i + close];
                if name.chars().all(|c| c.is_alphanumeric() || c == '_') && !name.is_empty() {
                    let value = params.get(name).cloned().unwrap_or(Value::Null);
                    ordinal += 1;
                    out.push_str(&positional(ordinal));
                    args.push(value);
                    i += close + 2;
                    continue;
                }
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }

    Ok((out, args))
}

/// Adds `%`-wrapped wildcards to a `LIKE` value that does not already
/// contain one at either end.
#[must_use]
pub fn ensure_like_wildcards(value: &str) -> String {
    if value.contains('%') {
        value.to_string()
    } else {
        format!("%{value}%")
    }
}

fn json_from_libsql(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Number(i.into()),
        libsql::Value::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(b) => Value::String(base64_lite(&b)),
    }
}

/// Minimal base64 encoder for BLOB columns - avoids pulling in a whole
/// base64 crate for the rare case a SQL backend returns binary data.
fn base64_lite(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 { ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { ALPHABET[(b2 & 0x3f) as usize] as char } else { '=' });
    }
    out
}

/// Generic SQL pool backed by `libsql` - covers SQLite-family deployments
/// and acts as the default, embeddable backend for tests.
pub struct LibsqlClient {
    name: String,
    db: libsql::Database,
}

impl LibsqlClient {
    pub async fn open_file(name: impl Into<String>, path: &std::path::Path) -> Result<Self, GatewayError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| GatewayError::backend("libsql", format!("failed to open {}: {e}", path.display())))?;
        Ok(Self { name: name.into(), db })
    }

    pub async fn open_in_memory(name: impl Into<String>) -> Result<Self, GatewayError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| GatewayError::backend("libsql", e.to_string()))?;
        Ok(Self { name: name.into(), db })
    }
}

#[async_trait]
impl SqlClient for LibsqlClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, statement: &str, params: &HashMap<String, Value>) -> Result<Vec<Row>, GatewayError> {
        let (rewritten, args) = rewrite_named_placeholders(statement, params, |_| "?".to_string())?;
        let conn = self
            .db
            .connect()
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;

        let bind_values: Vec<libsql::Value> = args
            .into_iter()
            .map(|v| json_value_to_libsql(&v))
            .collect();

        let mut rows = conn
            .query(&rewritten, bind_values)
            .await
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| GatewayError::backend(&self.name, e.to_string()))? {
            let mut obj = Row::new();
            for idx in 0..rows.column_count() {
                let col_name = rows.column_name(idx as i32).unwrap_or("column").to_string();
                let value = row
                    .get_value(idx as i32)
                    .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;
                obj.insert(col_name, json_from_libsql(value));
            }
            out.push(obj);
        }
        Ok(out)
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        self.query("SELECT 1", &HashMap::new()).await.map(|_| ())
    }
}

fn json_value_to_libsql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                libsql::Value::Integer(i)
            } else {
                libsql::Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => libsql::Value::Text(s.clone()),
        other => libsql::Value::Text(other.to_string()),
    }
}

/// PostgreSQL pool backed by `deadpool-postgres`. Named placeholders are
/// rewritten to `$1..$N` since Postgres's wire protocol has no native
/// named-bind support.
pub struct PostgresClient {
    name: String,
    pool: deadpool_postgres::Pool,
}

impl PostgresClient {
    pub fn new(name: impl Into<String>, dsn: &str, pool_size: usize) -> Result<Self, GatewayError> {
        let pg_config: tokio_postgres::Config = dsn
            .parse()
            .map_err(|e| GatewayError::config(format!("invalid postgres dsn: {e}")))?;
        let mgr_config = deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        };
        let manager = deadpool_postgres::Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
        let pool = deadpool_postgres::Pool::builder(manager)
            .max_size(pool_size.max(1))
            .build()
            .map_err(|e| GatewayError::config(format!("failed to build postgres pool: {e}")))?;
        Ok(Self { name: name.into(), pool })
    }
}

#[async_trait]
impl SqlClient for PostgresClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, statement: &str, params: &HashMap<String, Value>) -> Result<Vec<Row>, GatewayError> {
        let (rewritten, args) = rewrite_named_placeholders(statement, params, |n| format!("${n}"))?;
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("pool checkout failed: {e}")))?;

        let bind_args: Vec<Box<dyn tokio_postgres::types::ToSql + Sync>> =
            args.iter().map(json_value_to_postgres).collect();
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = bind_args.iter().map(AsRef::as_ref).collect();

        let rows = client
            .query(&rewritten, &refs)
            .await
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;

        Ok(rows.iter().map(postgres_row_to_json).collect())
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;
        client
            .execute("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))
    }
}

fn json_value_to_postgres(value: &Value) -> Box<dyn tokio_postgres::types::ToSql + Sync> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Box::new(i)
            } else {
                Box::new(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

/// Converts one `tokio_postgres::Row` to a JSON object, treating every
/// column as text-representable - sufficient for the context-item shaping
/// downstream, which only ever needs JSON-safe scalars.
fn postgres_row_to_json(row: &tokio_postgres::Row) -> Row {
    let mut obj = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value: Value = row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::String);
        obj.insert(column.name().to_string(), value);
    }
    obj
}

#[must_use]
pub fn noop_pool_warning(backend: &str, pool_size: usize) {
    if pool_size == 0 {
        warn!(backend, "pool_size configured as 0, treating as 1");
    } else {
        debug!(backend, pool_size, "datasource pool sized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_produces_positional_markers_in_textual_order() {
        let mut params = HashMap::new();
        params.insert("customer_id".to_string(), Value::from(456));
        params.insert("status".to_string(), Value::from("open"));

        let (sql, args) = rewrite_named_placeholders(
            "SELECT * FROM orders WHERE customer_id = %(customer_id)s AND status = %(status)s",
            &params,
            |n| format!("${n}"),
        )
        .unwrap();

        assert_eq!(sql, "SELECT * FROM orders WHERE customer_id = $1 AND status = $2");
        assert_eq!(args, vec![Value::from(456), Value::from("open")]);
    }

    #[test]
    fn missing_param_binds_null_rather_than_erroring() {
        let params = HashMap::new();
        let (sql, args) = rewrite_named_placeholders("SELECT %(ghost)s", &params, |_| "?".to_string()).unwrap();
        assert_eq!(sql, "SELECT ?");
        assert_eq!(args, vec![Value::Null]);
    }

    #[test]
    fn like_wildcards_are_added_only_when_absent() {
        assert_eq!(ensure_like_wildcards("acme"), "%acme%");
        assert_eq!(ensure_like_wildcards("%acme"), "%acme");
    }

    #[tokio::test]
    async fn libsql_in_memory_round_trips_a_query() {
        let client = LibsqlClient::open_in_memory("test").await.unwrap();
        let conn = client.db.connect().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER, name TEXT)", ()).await.unwrap();
        conn.execute("INSERT INTO t VALUES (1, 'a')", ()).await.unwrap();

        let mut params = HashMap::new();
        params.insert("id".to_string(), Value::from(1));
        let rows = client.query("SELECT * FROM t WHERE id = %(id)s", &params).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::String("a".to_string())));
    }
}
