//! PDF Locator MCP Server - Entry point

use pdf_locator_mcp::{run_server_with_config, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_locator_mcp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!(
        resource_dirs = ?config.resource_dirs,
        allow_private_urls = config.allow_private_urls,
        cache_max_entries = config.cache_max_entries,
        "Starting PDF Locator MCP Server"
    );

    run_server_with_config(config).await
}
