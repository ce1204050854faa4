mod config;
mod logging;
mod runner;
mod serve;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use smehub_core::{LifecycleCoordinator, TemplateReportGenerator};
use tracing::{error, info, warn};

use crate::config::{Config, StoreConfig};

/// SmeHub business report service.
#[derive(Parser)]
#[command(name = "smehub", version, about = "SmeHub business report service")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the report HTTP API server
    Serve {
        /// Host to bind (overrides HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one report request from a JSON file and print the response
    Request {
        /// Path to a report request JSON file
        file: PathBuf,
    },
}

fn main() {
    // Load .env file (from the working directory or its parents)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("warning: failed to initialise logging: {}", e);
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let coordinator = build_coordinator(&config);

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.host.clone());
            let port = port.unwrap_or(config.port);
            if let Err(e) = rt.block_on(serve::start_server(&host, port, coordinator)) {
                error!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Request { file } => {
            let code = rt.block_on(runner::run_request_file(&file, &coordinator));
            process::exit(code);
        }
    }
}

/// Wire the configured store and the placeholder generator into a coordinator.
fn build_coordinator(config: &Config) -> LifecycleCoordinator {
    if let StoreConfig::Firestore(fs) = &config.store {
        info!(
            project = %fs.project_id,
            collection = %fs.collection,
            credentials = fs.credentials.kind(),
            "connecting to Firestore"
        );
    }
    let store = config.store.connect();
    match &store {
        Some(s) => info!(backend = s.backend(), "report store initialized successfully"),
        None => warn!("report store not initialized - running in demo mode"),
    }
    LifecycleCoordinator::new(store, Arc::new(TemplateReportGenerator::new()))
}
