//! Insights gateway - HTTP server over the insight collection
//!
//! Usage:
//!   insights [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Configuration file (default: insights.yml)
//!   --database <URI>    Collection location (overrides DATABASE and config)
//!   --port <PORT>       HTTP port (overrides PORT and config)
//!   --host <HOST>       Bind address (overrides config)

mod config;

use clap::Parser;
use config::{ServerConfig, DEFAULT_CONFIG_PATH};
use insights_api::{create_router, AppState};
use insights_storage::{MemoryStore, StoreUri};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Command line arguments. `PORT` and `DATABASE` are read from the
/// environment (or `.env`) when the flag is absent.
#[derive(Debug, Parser)]
#[command(name = "insights", version, about = "Insights query gateway")]
struct CliArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Bind address
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Collection location, `file://<path>` or a bare path
    #[arg(short, long, env = "DATABASE")]
    database: Option<String>,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    generate_config: bool,
}

impl CliArgs {
    fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(database) = &self.database {
            config.database.uri = database.clone();
        }
    }
}

fn load_config(args: &CliArgs) -> ServerConfig {
    let mut config = if args.config.exists() {
        match ServerConfig::from_file(&args.config) {
            Ok(c) => {
                println!("Loaded configuration from: {}", args.config.display());
                c
            }
            Err(e) => {
                eprintln!("Warning: Failed to load {}: {}", args.config.display(), e);
                eprintln!("Using default configuration");
                ServerConfig::default()
            }
        }
    } else {
        ServerConfig::default()
    };
    args.apply_overrides(&mut config);
    config
}

fn init_logging(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(config.logging.show_target)
        .with_thread_ids(config.logging.show_thread_ids)
        .with_file(config.logging.show_location)
        .with_line_number(config.logging.show_location)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT received, shutting down gracefully...");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down gracefully...");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to read .env: {}", e);
        }
    }

    let args = CliArgs::parse();

    if args.generate_config {
        ServerConfig::write_default(&args.config)?;
        println!("Generated default configuration: {}", args.config.display());
        return Ok(());
    }

    let config = load_config(&args);
    init_logging(&config)?;

    info!("Starting insights gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Query timeout: {} seconds", config.server.query_timeout_secs);
    info!("Max concurrent queries: {}", config.server.max_concurrent_queries);

    // Connect once; the server never starts without its collection.
    // Only the parsed URI is logged, never the raw setting.
    let uri = match StoreUri::parse(&config.database.uri) {
        Ok(uri) => uri,
        Err(e) => {
            error!("Invalid database setting: {}", e);
            std::process::exit(1);
        }
    };
    let open_uri = uri.clone();
    let store = match tokio::task::spawn_blocking(move || MemoryStore::open(&open_uri)).await {
        Ok(Ok(store)) => store,
        Ok(Err(e)) => {
            error!("Failed to open collection {}: {}", uri, e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Collection loading task panicked: {}", e);
            std::process::exit(1);
        }
    };
    if store.documents().is_empty() {
        warn!("Collection {} is empty", uri);
    }

    let app_state = Arc::new(AppState::new(
        Arc::new(store),
        config.query_timeout(),
        config.server.max_concurrent_queries,
    ));
    let app = create_router(app_state, config.request_timeout());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}
