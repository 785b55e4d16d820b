//! ragbot API Server

use anyhow::Context;
use ragbot_api::{create_router, state::AppState};
use ragbot_core::config::{AppConfig, LoggingConfig};
use ragbot_core::VectorBackend;
use ragbot_rag::{create_chat_client, RagOrchestrator};
use ragbot_vector::{create_embedding_client, create_vector_store, verify_dimension};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=debug", config.level).into());

    if config.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("RAGBOT_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let store = create_vector_store(&config.vector, timeout).await?;
    if config.vector.backend == VectorBackend::Memory {
        store.ensure_collection().await?;
    }
    verify_dimension(store.as_ref(), config.vector.dimension)
        .await
        .context("vector collection does not match the embedding configuration")?;

    let embedder = create_embedding_client(&config.llm, config.vector.dimension)?;
    let chat = create_chat_client(&config.llm)?;
    let rag = RagOrchestrator::new(Arc::from(embedder), store, Arc::from(chat), &config.rag)
        .with_content_field(config.vector.content_field.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config, Arc::new(rag)));

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("ragbot API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
