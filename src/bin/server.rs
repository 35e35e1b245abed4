//! HTTP server answering `POST /ask`

use anyhow::{Context, Result};
use clap::Parser;
use nlsql_agents::config::ServerConfig;
use nlsql_agents::executor::PgExecutor;
use nlsql_agents::http;
use nlsql_agents::pipeline::AskPipeline;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let addr = config.bind_addr()?;

    let executor = PgExecutor::connect_lazy(&config.db);
    match executor.ping().await {
        Ok(()) => info!(
            "[OK] Connected to database {} at {}:{}",
            config.db.db_name, config.db.db_host, config.db.db_port
        ),
        Err(e) => warn!("[WARN] Database not reachable yet: {}", e),
    }

    let pipeline = Arc::new(AskPipeline::new(Arc::new(executor)));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("[OK] Server listening on http://{}", addr);

    http::serve(listener, pipeline).await?;
    Ok(())
}
