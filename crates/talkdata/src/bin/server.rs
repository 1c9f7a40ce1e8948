//! talkdata server binary
//!
//! Run with: cargo run -p talkdata --bin talkdata-server -- --config talkdata.toml

use clap::Parser;
use std::path::PathBuf;
use talkdata::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "talkdata-server")]
#[command(about = "Document question answering with source citations", version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "TALKDATA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talkdata=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = RagConfig::discover(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.backend);
    tracing::info!("  - Chat model: {}", config.llm.chat_model);
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Top k: {}", config.retrieval.top_k);

    let server = RagServer::new(config)?;

    match server.state().pipeline().composer().llm().health_check().await {
        Ok(true) => tracing::info!("Chat backend reachable"),
        Ok(false) | Err(_) => tracing::warn!("Chat backend not reachable; questions will fail until it is"),
    }

    tracing::info!("  API: http://{}/api/info", server.address());
    tracing::info!("  Health: http://{}/health", server.address());

    server.start().await?;

    Ok(())
}
