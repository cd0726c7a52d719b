use std::sync::Arc;

use anyhow::Result;
use atlas_mcp::config::AppConfig;
use atlas_mcp::gate::{AuthSettings, GateSettings, GateState};
use atlas_mcp::session::{
    Cipher, DurableStore, HttpKvBackend, SessionStore, SweeperHandle, VolatileStore,
};
use atlas_mcp::create_server;
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

// rmcp imports for MCP stdio server mode
use rmcp::service::ServiceExt;
use rmcp::transport::stdio;

#[derive(Parser)]
#[command(name = "atlas-mcp")]
#[command(about = "MCP server for place search and routing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as an MCP Streamable HTTP server
    Serve {
        /// Bind address, e.g. 127.0.0.1:3900
        #[arg(long, default_value = "127.0.0.1:3900", env = "ATLAS_BIND")]
        bind: String,
    },
    /// Run as an MCP stdio server (for use in mcp.json)
    Stdio,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("atlas_mcp=info".parse()?)
                .add_directive("rmcp=warn".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    config.validate()?;

    // validate() guarantees the key is present.
    let maps_api_key = config.maps_api_key.clone().unwrap_or_default();
    let server = create_server(maps_api_key)?;

    match cli.command {
        Commands::Serve { bind } => {
            let auth = AuthSettings::resolve(&config.auth);
            for issue in auth.validate() {
                warn!("Auth configuration issue: {}", issue);
            }
            if config.dev_mode {
                warn!("Dev mode enabled: origin checks are relaxed");
            }

            let settings = GateSettings::new(auth).with_dev_mode(config.dev_mode);
            let (sessions, sweeper) = build_session_store(&config);
            let gate = GateState::new(settings, sessions);

            atlas_mcp::server::start_http(server, &bind, gate).await?;

            sweeper.stop().await;
        }
        Commands::Stdio => {
            info!("Starting MCP stdio server");

            // Run as an MCP stdio server. McpServer implements ServerHandler.
            let service = server
                .as_ref()
                .clone()
                .serve(stdio())
                .await
                .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

            // Block until the MCP session ends.
            service.waiting().await?;
            info!("MCP stdio server session ended");
        }
    }

    Ok(())
}

/// Pick the session store for this deployment: durable when a key-value
/// namespace and encryption key are configured, otherwise in-memory.
///
/// The volatile store always exists (as primary or as the durable store's
/// fallback) and its sweeper runs either way.
fn build_session_store(config: &AppConfig) -> (Arc<dyn SessionStore>, SweeperHandle) {
    let volatile = VolatileStore::new();
    let sweeper = volatile.start_sweeper();

    match (&config.session_kv, &config.session_encryption_key) {
        (Some(kv), Some(key)) => {
            info!("Using durable session store at {}", kv.url);
            let backend = Arc::new(HttpKvBackend::new(kv.url.clone(), kv.token.clone()));
            let store = DurableStore::new(backend, Cipher::from_secret(key), volatile);
            (Arc::new(store), sweeper)
        }
        _ => {
            info!("Using in-memory session store");
            (Arc::new(volatile), sweeper)
        }
    }
}
