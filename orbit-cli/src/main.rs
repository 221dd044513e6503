//! ABOUTME: `orbit` - thin demonstration binary over the gateway library crates
//! ABOUTME: Only this binary initializes a tracing subscriber; every library crate only emits events

mod cli;
mod runtime;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, TraceLevel};
use orbit_config::OrbitConfig;
use orbit_orchestrator::{ChatMessage, ChatOutcome, ChatRequest};
use runtime::GatewayRuntime;
use tokio_stream::StreamExt;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { adapters, api_key } => run_serve(config, adapters, api_key).await,
        Commands::ReloadAdapters => run_reload_adapters(config).await,
        Commands::Health => run_health(config).await,
    }
}

/// `RUST_LOG` wins when set; otherwise the `--trace` flag picks a single
/// global level.
fn init_tracing(trace: TraceLevel) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(tracing::Level::from(trace).to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(path: Option<&std::path::Path>) -> Result<OrbitConfig> {
    match path {
        Some(path) => OrbitConfig::load_from_file(path).with_context(|| format!("loading config from {}", path.display())),
        None => {
            info!("no --config given, starting from an all-defaults OrbitConfig");
            Ok(OrbitConfig::default())
        }
    }
}

/// Reads lines from stdin, running each through the full
/// throttle -> fan-out -> prompt -> LLM pipeline and printing the answer.
async fn run_serve(config: OrbitConfig, adapters: Vec<String>, api_key: String) -> Result<()> {
    let runtime = GatewayRuntime::bootstrap(config).await.context("bootstrapping gateway runtime")?;
    println!("orbit gateway ready. type a message and press enter (ctrl-d to quit).");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        line.clear();
        let bytes_read = stdin.read_line(&mut line).context("reading from stdin")?;
        if bytes_read == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let request = ChatRequest {
            messages: vec![ChatMessage::user(text)],
            adapters: if adapters.is_empty() { None } else { Some(adapters.clone()) },
            session_id: None,
            stream: false,
        };

        match runtime.orchestrator.handle_chat(request, &api_key).await {
            ChatOutcome::Answer { response, sources } => {
                println!("{response}");
                if !sources.is_empty() {
                    println!("  ({} source(s))", sources.len());
                }
            }
            ChatOutcome::Streaming { mut stream, sources } => {
                let mut out = String::new();
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(chunk) => {
                            print!("{}", chunk.text);
                            out.push_str(&chunk.text);
                            if chunk.is_final {
                                break;
                            }
                        }
                        Err(err) => {
                            error!(error = %err, "stream interrupted");
                            break;
                        }
                    }
                }
                println!();
                if !sources.is_empty() {
                    println!("  ({} source(s))", sources.len());
                }
                let _ = out;
            }
            ChatOutcome::Throttled { reason, retry_after } => {
                println!("429 rate limited: {reason} (retry after {}s)", retry_after.as_secs());
            }
        }
    }

    Ok(())
}

async fn run_reload_adapters(config: OrbitConfig) -> Result<()> {
    let next = config.adapters.clone();
    let runtime = GatewayRuntime::bootstrap(config).await.context("bootstrapping gateway runtime")?;
    let summary = runtime.reload_adapters(next);
    println!("added:     {:?}", summary.added);
    println!("removed:   {:?}", summary.removed);
    println!("updated:   {:?}", summary.updated);
    println!("unchanged: {:?}", summary.unchanged);
    Ok(())
}

async fn run_health(config: OrbitConfig) -> Result<()> {
    let datasource_count = config.datasources.backends.len();
    let inference_count = config.providers.inference.len();
    let embedding_count = config.providers.embedding.len();
    let adapter_count = config.adapters.len();

    let runtime = GatewayRuntime::bootstrap(config).await.context("bootstrapping gateway runtime")?;
    let descriptor_names = runtime.registry.descriptor_names();

    println!("datasources configured: {datasource_count}");
    println!("inference providers:    {inference_count}");
    println!("embedding providers:    {embedding_count}");
    println!("adapter descriptors:    {adapter_count}");
    println!("adapter names:          {descriptor_names:?}");
    Ok(())
}
