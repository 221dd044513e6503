//! ABOUTME: Argument parsing for the demonstration binary - config/profile globals plus three subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<TraceLevel> for tracing::Level {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Off | TraceLevel::Error => tracing::Level::ERROR,
            TraceLevel::Warn => tracing::Level::WARN,
            TraceLevel::Info => tracing::Level::INFO,
            TraceLevel::Debug => tracing::Level::DEBUG,
            TraceLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "orbit")]
#[command(version)]
#[command(about = "ORBIT gateway - demonstration CLI over the library crates")]
pub struct Cli {
    /// Path to an `OrbitConfig` TOML file (GLOBAL).
    #[arg(short = 'c', long, global = true, env = "ORBIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Trace level (GLOBAL). `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub trace: TraceLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an interactive chat loop over stdin, exercising the full
    /// throttle -> fan-out -> prompt -> LLM pipeline for each line typed.
    Serve {
        /// Adapter names fanned out to when a line doesn't request its own.
        #[arg(long)]
        adapters: Vec<String>,
        /// Caller identity threaded through to the quota/throttle subsystem.
        #[arg(long, default_value = "local-cli")]
        api_key: String,
    },
    /// Reload the adapter descriptor set from the config file and print
    /// the added/removed/updated/unchanged summary.
    ReloadAdapters,
    /// Print a one-shot health snapshot: configured datasources, providers,
    /// and adapter descriptor count.
    Health,
}
