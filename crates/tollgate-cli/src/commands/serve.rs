//! `tollgate serve` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use tollgate_core::GateConfig;
use tollgate_mcp::{McpServer, MySqlPoolOptions};

/// Connect to the upstream database and run the MCP server on stdio.
pub async fn run(config: &GateConfig) -> Result<()> {
    let url = config
        .upstream
        .connection_url()
        .context("upstream connection is not configured")?;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.upstream.pool.max_connections)
        .acquire_timeout(Duration::from_secs(config.upstream.pool.acquire_timeout_secs))
        .connect(&url)
        .await
        .context("failed to connect to the upstream database")?;

    tracing::info!(
        host = %config.upstream.host,
        port = config.upstream.port,
        "connected to upstream MySQL"
    );

    let server = McpServer::new(pool, config.effective_permissions());
    server.run_stdio().await?;
    Ok(())
}
