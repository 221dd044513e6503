//! ABOUTME: Datasource connection pool configuration (C1) - one entry per named backend

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasourceKind {
    Sql,
    DuckDb,
    Mongo,
    Http,
    GraphQl,
}

/// One named backend's connection parameters. Kept free-form (`options`)
/// because each kind's fields differ (DSN vs. `database_path`/`database`
/// precedence vs. base URL) and those details live in `orbit-datasources`,
/// which is downstream of this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasourceConfig {
    pub name: String,
    pub kind: DatasourceKind,
    pub pool_size: u32,
    pub connect_timeout_ms: u64,
    #[serde(flatten)]
    pub options: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasourcesConfig {
    pub backends: Vec<DatasourceConfig>,
}

impl DatasourcesConfig {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DatasourceConfig> {
        self.backends.iter().find(|b| b.name == name)
    }
}
