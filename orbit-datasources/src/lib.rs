//! ABOUTME: Typed connection pools to SQL, NoSQL, and HTTP backends (C1)
//! ABOUTME: Lifecycle (lazy connect, health check, teardown on reload) lives here; query shaping lives in orbit-intent

pub mod duckdb_client;
pub mod graphql;
pub mod http;
pub mod mongo;
pub mod sql;

pub use duckdb_client::DuckDbClient;
pub use graphql::{GraphQlClient, GraphQlRequest, GraphQlResponse};
pub use http::{HttpClient, HttpClientConfig, HttpRequestSpec, HttpResponse};
pub use mongo::{MongoClient, MongoQueryType};
pub use sql::{LibsqlClient, PostgresClient, Row, SqlClient};

use serde::{Deserialize, Serialize};

/// One row of results from any backend family, normalized to a JSON object -
/// every driver's native types are converted to JSON-safe forms.
pub type RowValue = serde_json::Map<String, serde_json::Value>;

/// Which named backend a datasource connects to, as referenced by an
/// Adapter descriptor's `datasource` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Sql,
    DuckDb,
    Mongo,
    Http,
    GraphQl,
}
