//! ABOUTME: DuckDB pool - SQL family with positional `?` binds and file/:memory: precedence
//! ABOUTME: duckdb's Connection is blocking; every call is dispatched to spawn_blocking

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orbit_core::GatewayError;
use serde_json::Value;

use crate::sql::{rewrite_named_placeholders, Row, SqlClient};

/// Resolves the database target honoring the configured precedence
/// `database_path > database > :memory:`.
#[must_use]
pub fn resolve_target(database_path: Option<&str>, database: Option<&str>) -> String {
    database_path
        .or(database)
        .map(str::to_string)
        .unwrap_or_else(|| ":memory:".to_string())
}

pub struct DuckDbClient {
    name: String,
    conn: Arc<Mutex<duckdb::Connection>>,
}

impl DuckDbClient {
    pub fn open(name: impl Into<String>, database_path: Option<&str>, database: Option<&str>) -> Result<Self, GatewayError> {
        let target = resolve_target(database_path, database);
        let conn = if target == ":memory:" {
            duckdb::Connection::open_in_memory()
        } else {
            duckdb::Connection::open(&target)
        }
        .map_err(|e| GatewayError::backend("duckdb", format!("failed to open {target}: {e}")))?;
        Ok(Self {
            name: name.into(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl SqlClient for DuckDbClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, statement: &str, params: &HashMap<String, Value>) -> Result<Vec<Row>, GatewayError> {
        let (rewritten, args) = rewrite_named_placeholders(statement, params, |_| "?".to_string())?;
        let conn = self.conn.clone();
        let backend = self.name.clone();

        tokio::task::spawn_blocking(move || run_query(&conn, &rewritten, &args, &backend))
            .await
            .map_err(|e| GatewayError::backend(&backend, format!("duckdb task panicked: {e}")))?
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        self.query("SELECT 1", &HashMap::new()).await.map(|_| ())
    }
}

fn run_query(
    conn: &Mutex<duckdb::Connection>,
    sql: &str,
    args: &[Value],
    backend: &str,
) -> Result<Vec<Row>, GatewayError> {
    let guard = conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut stmt = guard
        .prepare(sql)
        .map_err(|e| GatewayError::backend(backend, e.to_string()))?;

    let wrapped: Vec<JsonSql<'_>> = args.iter().map(JsonSql).collect();
    let bind_params: Vec<&dyn duckdb::ToSql> = wrapped.iter().map(|v| v as &dyn duckdb::ToSql).collect();

    let column_names: Vec<String> = stmt.column_names();
    let mut rows_iter = stmt
        .query(bind_params.as_slice())
        .map_err(|e| GatewayError::backend(backend, e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows_iter.next().map_err(|e| GatewayError::backend(backend, e.to_string()))? {
        let mut obj = Row::new();
        for (idx, col_name) in column_names.iter().enumerate() {
            let value: duckdb::types::Value = row
                .get(idx)
                .map_err(|e| GatewayError::backend(backend, e.to_string()))?;
            obj.insert(col_name.clone(), duckdb_value_to_json(value));
        }
        out.push(obj);
    }
    Ok(out)
}

fn duckdb_value_to_json(value: duckdb::types::Value) -> Value {
    use duckdb::types::Value as D;
    match value {
        D::Null => Value::Null,
        D::Boolean(b) => Value::Bool(b),
        D::TinyInt(i) => Value::Number(i.into()),
        D::SmallInt(i) => Value::Number(i.into()),
        D::Int(i) => Value::Number(i.into()),
        D::BigInt(i) => Value::Number(i.into()),
        D::HugeInt(i) => serde_json::Number::from_f64(i as f64).map(Value::Number).unwrap_or(Value::Null),
        D::Float(f) => serde_json::Number::from_f64(f64::from(f)).map(Value::Number).unwrap_or(Value::Null),
        D::Double(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        D::Decimal(d) => serde_json::Number::from_f64(d.to_string().parse().unwrap_or(0.0))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        D::Text(s) => Value::String(s),
        D::Date32(_) | D::Timestamp(..) => Value::String(format!("{value:?}")),
        other => Value::String(format!("{other:?}")),
    }
}

/// Newtype so we can implement the foreign `duckdb::ToSql` trait for
/// `serde_json::Value` without running afoul of the orphan rules.
struct JsonSql<'a>(&'a Value);

impl duckdb::ToSql for JsonSql<'_> {
    fn to_sql(&self) -> duckdb::Result<duckdb::types::ToSqlOutput<'_>> {
        let owned = match self.0 {
            Value::Null => duckdb::types::Value::Null,
            Value::Bool(b) => duckdb::types::Value::Boolean(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    duckdb::types::Value::BigInt(i)
                } else {
                    duckdb::types::Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => duckdb::types::Value::Text(s.clone()),
            other => duckdb::types::Value::Text(other.to_string()),
        };
        Ok(duckdb::types::ToSqlOutput::Owned(owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_prefers_database_path_over_database_over_memory() {
        assert_eq!(resolve_target(Some("/tmp/a.duckdb"), Some("b")), "/tmp/a.duckdb");
        assert_eq!(resolve_target(None, Some("b")), "b");
        assert_eq!(resolve_target(None, None), ":memory:");
    }

    #[tokio::test]
    async fn in_memory_round_trip() {
        let client = DuckDbClient::open("test", None, None).unwrap();
        {
            let conn = client.conn.lock().unwrap();
            conn.execute_batch("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
            conn.execute("INSERT INTO t VALUES (1, 'a')", []).unwrap();
        }
        let mut params = HashMap::new();
        params.insert("id".to_string(), Value::from(1));
        let rows = client.query("SELECT * FROM t WHERE id = %(id)s", &params).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::String("a".to_string())));
    }
}
