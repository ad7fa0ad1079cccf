//! Ingestion server binary
//!
//! Run with: cargo run -p pdfchat-ingest --bin pdfchat-ingest-server
//! Config file: set PDFCHAT_CONFIG to a TOML path (defaults apply otherwise).

use pdfchat_ingest::{config::IngestConfig, server::IngestServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfchat_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IngestConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.backend);
    tracing::info!("  - Database: {}", config.database.path.display());
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - Namespace: {}", config.vector_index.namespace);
    tracing::info!("  - Chunking: {:?}", config.chunking.mode);
    tracing::info!(
        "  - Timeouts: file {}s, fetch {}s, parse {}s, embed {}s, index {}s",
        config.processing.file_timeout_secs,
        config.processing.fetch_timeout_secs,
        config.processing.parse_timeout_secs,
        config.processing.embed_timeout_secs,
        config.processing.index_timeout_secs
    );

    let server = IngestServer::new(config).await?;
    tracing::info!("Trigger endpoint: POST http://{}/api/uploads/complete", server.address());

    server.start().await?;

    Ok(())
}
