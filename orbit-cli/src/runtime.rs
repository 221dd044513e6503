//! ABOUTME: Wires a loaded `OrbitConfig` into a running gateway: providers, datasources,
//! ABOUTME: the adapter registry and its factories, the executor, quota/throttle, and the orchestrator

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use orbit_breaker::{BreakerConfig, CircuitBreakerManager};
use orbit_config::{DatasourceKind, OrbitConfig};
use orbit_core::{AdapterDescriptor, GatewayError};
use orbit_datasources::{DuckDbClient, GraphQlClient, HttpClient, HttpClientConfig, LibsqlClient, MongoClient, PostgresClient, SqlClient};
use orbit_executor::ExecutorConfig;
use orbit_executor::ParallelAdapterExecutor;
use orbit_intent::{ExecutionBackend, IntentEngine, TemplateMatcher};
use orbit_orchestrator::{ChatOrchestrator, OrchestratorConfig};
use orbit_providers::{
    create_openai_embedding_provider, create_rig_provider, EmbeddingProviderManager, InferenceProviderManager,
};
use orbit_quota::{QuotaService, ThrottleMiddleware};
use orbit_retrievers::{AdapterRegistry, FileChunksAdapter, MongoDirectAdapter, ReloadSummary, VectorSimilarityAdapter};
use orbit_templates::{DomainVocabulary, Template, TemplateStore};
use orbit_vectorstore::{LocalVectorStore, RemoteVectorStore, RemoteVectorStoreConfig, VectorStore};
use tracing::{info, warn};

/// A named backend ready for an Intent Engine to execute operations
/// against. Every SQL-family backend (libsql, Postgres, DuckDB) is erased
/// behind `SqlClient` so the `intent-sql`/`intent-duckdb` factories don't
/// need to care which driver backs a given descriptor's `datasource`.
#[derive(Clone)]
enum ConnectedDatasource {
    Sql(Arc<dyn SqlClient>),
    Mongo(Arc<MongoClient>),
    Http(Arc<HttpClient>),
    GraphQl(Arc<GraphQlClient>),
}

/// Everything a demonstration session needs, assembled once at startup.
pub struct GatewayRuntime {
    pub config: OrbitConfig,
    pub registry: Arc<AdapterRegistry>,
    pub inference: Arc<InferenceProviderManager>,
    pub embedding: Arc<EmbeddingProviderManager>,
    pub quota: Arc<QuotaService>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl GatewayRuntime {
    pub async fn bootstrap(config: OrbitConfig) -> Result<Self> {
        let inference = Arc::new(InferenceProviderManager::new());
        inference.register("openai", create_rig_provider).await;
        inference.register("anthropic", create_rig_provider).await;
        inference.register("cohere", create_rig_provider).await;
        for entry in &config.providers.inference {
            inference
                .init_provider(entry.resolve())
                .await
                .with_context(|| format!("initializing inference provider '{}'", entry.name))?;
        }

        let embedding = Arc::new(EmbeddingProviderManager::new());
        embedding.register("openai", create_openai_embedding_provider).await;
        for entry in &config.providers.embedding {
            embedding
                .init_provider(entry.resolve())
                .await
                .with_context(|| format!("initializing embedding provider '{}'", entry.name))?;
        }

        let datasources = connect_datasources(&config).await?;

        let default_embedding = embedding.get(config.providers.default_embedding.as_deref()).await.ok();
        let template_matcher = match &default_embedding {
            Some(embedding_provider) => match build_template_matcher(&config, embedding_provider.clone()).await {
                Ok(matcher) => Some(Arc::new(matcher)),
                Err(err) => {
                    warn!(error = %err, "template library not loaded, 'intent' adapters will fail to build");
                    None
                }
            },
            None => {
                warn!("no embedding provider configured, template matching is unavailable");
                None
            }
        };

        let breaker_config = BreakerConfig::from(&config.circuit_breaker);
        let registry = Arc::new(AdapterRegistry::new(breaker_config));
        register_factories(&registry, &datasources, &embedding, &inference, template_matcher);
        registry.load_descriptors(config.adapters.clone());

        let breakers = Arc::new(CircuitBreakerManager::new());
        let executor_config =
            ExecutorConfig::try_from(&config.executor).map_err(|reason| anyhow::anyhow!(reason))?;
        let executor = Arc::new(ParallelAdapterExecutor::new(registry.clone(), breakers, executor_config));

        let quota = Arc::new(QuotaService::connect(config.quota.clone()).await.context("connecting to redis for quota service")?);
        let throttle = Arc::new(ThrottleMiddleware::new(quota.clone(), config.throttle.clone()));

        let default_adapters: Vec<String> = config.adapters.iter().filter(|d| d.enabled).map(|d| d.name.clone()).collect();
        let orchestrator_config = OrchestratorConfig {
            default_adapters,
            inference_provider: config.providers.default_inference.clone(),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Arc::new(ChatOrchestrator::new(throttle, executor, inference.clone(), orchestrator_config));

        info!(adapters = config.adapters.len(), "gateway runtime bootstrapped");
        Ok(Self { config, registry, inference, embedding, quota, orchestrator })
    }

    pub fn reload_adapters(&self, next: Vec<AdapterDescriptor>) -> ReloadSummary {
        self.registry.load_descriptors(next)
    }
}

/// Connects every configured datasource once at startup, dispatching on
/// `kind` to the right driver across the five backend families. Connection
/// is eager here (unlike the adapter instance cache, which is lazy) because
/// a datasource may be shared by several adapters and its pool is cheap to
/// hold open for the process lifetime.
async fn connect_datasources(config: &OrbitConfig) -> Result<HashMap<String, ConnectedDatasource>> {
    let mut connected = HashMap::new();
    for backend in &config.datasources.backends {
        let opt_str = |key: &str| backend.options.get(key).and_then(serde_json::Value::as_str);

        let datasource = match backend.kind {
            DatasourceKind::Sql => {
                if let Some(dsn) = opt_str("dsn") {
                    let client = PostgresClient::new(backend.name.clone(), dsn, backend.pool_size as usize)
                        .with_context(|| format!("building postgres pool for datasource '{}'", backend.name))?;
                    ConnectedDatasource::Sql(Arc::new(client))
                } else if let Some(path) = opt_str("path") {
                    let client = LibsqlClient::open_file(backend.name.clone(), std::path::Path::new(path))
                        .await
                        .with_context(|| format!("opening libsql file for datasource '{}'", backend.name))?;
                    ConnectedDatasource::Sql(Arc::new(client))
                } else {
                    let client = LibsqlClient::open_in_memory(backend.name.clone())
                        .await
                        .with_context(|| format!("opening in-memory libsql for datasource '{}'", backend.name))?;
                    ConnectedDatasource::Sql(Arc::new(client))
                }
            }
            DatasourceKind::DuckDb => {
                let client = DuckDbClient::open(backend.name.clone(), opt_str("database_path"), opt_str("database"))
                    .with_context(|| format!("opening duckdb for datasource '{}'", backend.name))?;
                ConnectedDatasource::Sql(Arc::new(client))
            }
            DatasourceKind::Mongo => {
                let uri = opt_str("uri")
                    .ok_or_else(|| anyhow::anyhow!("mongo datasource '{}' is missing an 'uri' option", backend.name))?;
                let database = opt_str("database").unwrap_or(&backend.name);
                let client = MongoClient::connect(backend.name.clone(), uri, database)
                    .await
                    .with_context(|| format!("connecting to mongo datasource '{}'", backend.name))?;
                ConnectedDatasource::Mongo(Arc::new(client))
            }
            DatasourceKind::Http => {
                let client = HttpClient::new(HttpClientConfig::default())
                    .with_context(|| format!("building http client for datasource '{}'", backend.name))?;
                ConnectedDatasource::Http(Arc::new(client))
            }
            DatasourceKind::GraphQl => {
                let endpoint = opt_str("endpoint")
                    .ok_or_else(|| anyhow::anyhow!("graphql datasource '{}' is missing an 'endpoint' option", backend.name))?
                    .to_string();
                let http = HttpClient::new(HttpClientConfig::default())
                    .with_context(|| format!("building http client for graphql datasource '{}'", backend.name))?;
                ConnectedDatasource::GraphQl(Arc::new(GraphQlClient::new(http, endpoint)))
            }
        };
        connected.insert(backend.name.clone(), datasource);
    }
    Ok(connected)
}

async fn build_template_matcher(
    config: &OrbitConfig,
    embedding: Arc<dyn orbit_providers::EmbeddingProvider>,
) -> Result<TemplateMatcher> {
    let library_path = config
        .templates
        .library_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("templates.library_path not configured"))?;

    let vocabulary: DomainVocabulary = std::fs::read_to_string(library_path.join("vocabulary.json"))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default();

    let vector_store: Arc<dyn VectorStore> =
        Arc::new(LocalVectorStore::new("templates", library_path.join("templates.index"), embedding.dimensions(), 10_000));
    let store = Arc::new(TemplateStore::new(vector_store, embedding.clone(), "templates", vocabulary));

    let entries = std::fs::read_dir(library_path).with_context(|| format!("reading template library at {}", library_path.display()))?;
    let mut loaded = 0usize;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") || path.file_name().and_then(|n| n.to_str()) == Some("vocabulary.json") {
            continue;
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading template file {}", path.display()))?;
        let template: Template = serde_json::from_str(&text).with_context(|| format!("parsing template file {}", path.display()))?;
        store.add_template(template).await.map_err(|err: GatewayError| anyhow::anyhow!(err))?;
        loaded += 1;
    }
    info!(count = loaded, path = %library_path.display(), "loaded template library");

    Ok(TemplateMatcher::new(store, embedding, 5, config.templates.confidence_threshold))
}

fn register_factories(
    registry: &AdapterRegistry,
    datasources: &HashMap<String, ConnectedDatasource>,
    embedding: &Arc<EmbeddingProviderManager>,
    inference: &Arc<InferenceProviderManager>,
    template_matcher: Option<Arc<TemplateMatcher>>,
) {
    let mongo_clients: HashMap<String, Arc<MongoClient>> = datasources
        .iter()
        .filter_map(|(name, ds)| match ds {
            ConnectedDatasource::Mongo(client) => Some((name.clone(), client.clone())),
            _ => None,
        })
        .collect();
    let embedding_sqlite = embedding.clone();
    registry.register_factory("sqlite", move |descriptor| {
        let dims = config_u64(descriptor, "dims").unwrap_or(1536) as usize;
        let max_elements = config_u64(descriptor, "max_elements").unwrap_or(100_000) as usize;
        let path = config_str(descriptor, "path").ok_or_else(|| GatewayError::config("sqlite adapter requires config.path"))?;
        let collection = config_str(descriptor, "collection").unwrap_or_else(|| descriptor.name.clone());
        let threshold = config_f32(descriptor, "relevance_threshold").unwrap_or(0.5);
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::new(descriptor.name.clone(), path.into(), dims, max_elements));
        let embedding_provider = block_on(embedding_sqlite.get(descriptor.embedding_provider.as_deref()))?;
        Ok(Arc::new(VectorSimilarityAdapter::new(descriptor.name.clone(), store, embedding_provider, collection, threshold)))
    });

    let embedding_chroma = embedding.clone();
    registry.register_factory("chroma", move |descriptor| {
        let base_url = config_str(descriptor, "base_url").ok_or_else(|| GatewayError::config("chroma adapter requires config.base_url"))?;
        let api_key = config_str(descriptor, "api_key_env").and_then(|var| std::env::var(var).ok());
        let collection = config_str(descriptor, "collection").unwrap_or_else(|| descriptor.name.clone());
        let threshold = config_f32(descriptor, "relevance_threshold").unwrap_or(0.5);
        let store: Arc<dyn VectorStore> =
            Arc::new(RemoteVectorStore::new(descriptor.name.clone(), RemoteVectorStoreConfig { base_url, api_key }));
        let embedding_provider = block_on(embedding_chroma.get(descriptor.embedding_provider.as_deref()))?;
        Ok(Arc::new(VectorSimilarityAdapter::new(descriptor.name.clone(), store, embedding_provider, collection, threshold)))
    });

    let mongo_direct_clients = mongo_clients.clone();
    registry.register_factory("mongo-direct", move |descriptor| {
        let client = mongo_direct_clients
            .get(&descriptor.datasource)
            .cloned()
            .ok_or_else(|| GatewayError::config(format!("no mongo datasource named '{}'", descriptor.datasource)))?;
        let collection = config_str(descriptor, "collection").ok_or_else(|| GatewayError::config("mongo-direct adapter requires config.collection"))?;
        let search_fields: Vec<String> = descriptor
            .config
            .get("search_fields")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let threshold = config_f32(descriptor, "relevance_threshold").unwrap_or(0.0);
        let metadata_filter = descriptor
            .config
            .get("metadata_filter")
            .map(orbit_datasources::mongo::json_to_document)
            .unwrap_or_default();
        let max_limit = config_u64(descriptor, "max_limit").unwrap_or(10) as i64;
        Ok(Arc::new(
            MongoDirectAdapter::new(descriptor.name.clone(), client, collection, search_fields, metadata_filter, threshold)
                .with_max_limit(max_limit),
        ))
    });

    let embedding_chunks = embedding.clone();
    registry.register_factory("file-chunks", move |descriptor| {
        let dims = config_u64(descriptor, "dims").unwrap_or(1536) as usize;
        let max_elements = config_u64(descriptor, "max_elements").unwrap_or(100_000) as usize;
        let path = config_str(descriptor, "path").ok_or_else(|| GatewayError::config("file-chunks adapter requires config.path"))?;
        let collection = config_str(descriptor, "collection").unwrap_or_else(|| descriptor.name.clone());
        let threshold = config_f32(descriptor, "relevance_threshold").unwrap_or(0.5);
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::new(descriptor.name.clone(), path.into(), dims, max_elements));
        let embedding_provider = block_on(embedding_chunks.get(descriptor.embedding_provider.as_deref()))?;
        Ok(Arc::new(FileChunksAdapter::new(descriptor.name.clone(), store, embedding_provider, collection, threshold)))
    });

    if let Some(matcher) = template_matcher {
        let mongo_intent_clients = mongo_clients.clone();
        let intent_inference = inference.clone();
        let intent_matcher = matcher.clone();
        registry.register_factory("intent-mongo", move |descriptor| {
            let client = mongo_intent_clients
                .get(&descriptor.datasource)
                .cloned()
                .ok_or_else(|| GatewayError::config(format!("no mongo datasource named '{}'", descriptor.datasource)))?;
            let max_limit = config_u64(descriptor, "max_limit").unwrap_or(100) as i64;
            let inference_provider = block_on(intent_inference.get(descriptor.inference_provider.as_deref()))?;
            let backend = ExecutionBackend::Mongo { client, max_limit };
            Ok(Arc::new(IntentEngine::new(descriptor.name.clone(), (*intent_matcher).clone(), inference_provider, backend)))
        });

        let sql_clients: HashMap<String, Arc<dyn SqlClient>> = datasources
            .iter()
            .filter_map(|(name, ds)| match ds {
                ConnectedDatasource::Sql(client) => Some((name.clone(), client.clone())),
                _ => None,
            })
            .collect();
        let intent_inference = inference.clone();
        let intent_matcher = matcher.clone();
        registry.register_factory("intent-sql", move |descriptor| {
            let client = sql_clients
                .get(&descriptor.datasource)
                .cloned()
                .ok_or_else(|| GatewayError::config(format!("no sql/duckdb datasource named '{}'", descriptor.datasource)))?;
            let inference_provider = block_on(intent_inference.get(descriptor.inference_provider.as_deref()))?;
            let backend = ExecutionBackend::Sql(client);
            Ok(Arc::new(IntentEngine::new(descriptor.name.clone(), (*intent_matcher).clone(), inference_provider, backend)))
        });

        let http_clients: HashMap<String, Arc<HttpClient>> = datasources
            .iter()
            .filter_map(|(name, ds)| match ds {
                ConnectedDatasource::Http(client) => Some((name.clone(), client.clone())),
                _ => None,
            })
            .collect();
        let intent_inference = inference.clone();
        let intent_matcher = matcher.clone();
        registry.register_factory("intent-http", move |descriptor| {
            let client = http_clients
                .get(&descriptor.datasource)
                .cloned()
                .ok_or_else(|| GatewayError::config(format!("no http datasource named '{}'", descriptor.datasource)))?;
            let endpoint = config_str(descriptor, "endpoint").ok_or_else(|| GatewayError::config("intent-http adapter requires config.endpoint"))?;
            let method = config_str(descriptor, "method").unwrap_or_else(|| "GET".to_string());
            let inference_provider = block_on(intent_inference.get(descriptor.inference_provider.as_deref()))?;
            let backend = ExecutionBackend::Http { client, endpoint, method };
            Ok(Arc::new(IntentEngine::new(descriptor.name.clone(), (*intent_matcher).clone(), inference_provider, backend)))
        });

        let graphql_clients: HashMap<String, Arc<GraphQlClient>> = datasources
            .iter()
            .filter_map(|(name, ds)| match ds {
                ConnectedDatasource::GraphQl(client) => Some((name.clone(), client.clone())),
                _ => None,
            })
            .collect();
        let intent_inference = inference.clone();
        let intent_matcher = matcher;
        registry.register_factory("intent-graphql", move |descriptor| {
            let client = graphql_clients
                .get(&descriptor.datasource)
                .cloned()
                .ok_or_else(|| GatewayError::config(format!("no graphql datasource named '{}'", descriptor.datasource)))?;
            let inference_provider = block_on(intent_inference.get(descriptor.inference_provider.as_deref()))?;
            let backend = ExecutionBackend::GraphQl(client);
            Ok(Arc::new(IntentEngine::new(descriptor.name.clone(), (*intent_matcher).clone(), inference_provider, backend)))
        });
    }
}

fn config_str(descriptor: &AdapterDescriptor, key: &str) -> Option<String> {
    descriptor.config.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn config_u64(descriptor: &AdapterDescriptor, key: &str) -> Option<u64> {
    descriptor.config.get(key).and_then(|v| v.as_u64())
}

fn config_f32(descriptor: &AdapterDescriptor, key: &str) -> Option<f32> {
    descriptor.config.get(key).and_then(serde_json::Value::as_f64).map(|v| v as f32)
}

/// Adapter factories are synchronous (`AdapterFactory`'s signature has no
/// `async`), but resolving a named provider handle from the manager is an
/// async call over a `tokio::sync::RwLock`. Blocking on the current runtime
/// here is safe because `register_factory` closures only run from inside
/// `AdapterRegistry::resolve`, which is itself called from executor tasks
/// running on worker threads, never from within an already-held lock.
fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
