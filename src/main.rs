use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use stylizer::config::Config;
use stylizer::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stylizer", version, about = "Back up blob images and render styled variants")]
struct Cli {
    /// Address to listen on (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Default log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// JSON style catalog (overrides STYLE_CATALOG_PATH)
    #[arg(long)]
    styles: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(styles) = cli.styles {
        config.styles_path = Some(styles);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stylizer={},tower_http=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting stylizer service");
    tracing::info!(
        bind_addr = %config.bind_addr,
        rate_limit = config.rate_limit.limit,
        window_secs = config.rate_limit.window.as_secs(),
        storage_configured = config.storage_connection.is_some(),
        generation_configured = config.generation.is_configured(),
        "Configuration loaded"
    );

    let server = Server::new(&config)?;
    server.run().await?;

    Ok(())
}
