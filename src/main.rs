use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use nutri_gateway::config::load_config;
use nutri_gateway::lifecycle::{shutdown_signal, Shutdown};
use nutri_gateway::observability::{logging, metrics};
use nutri_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "nutri-gateway")]
#[command(about = "Rate-limited, filtered nutrition chat and analysis API", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for security setting changes
    #[arg(short, long, env = "NUTRI_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!("nutri-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        model = %config.provider.model,
        rate_limiting = config.features.enable_rate_limiting,
        security_filter = config.features.enable_security_filter,
        request_logging = config.features.enable_request_logging,
        "Configuration loaded"
    );
    if config.provider.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; AI routes will fail");
    }

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let mut server = HttpServer::new(config)?;
    if let Some(path) = cli.config {
        server = server.watch_config(path);
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
