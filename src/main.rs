mod chunker;
mod config;
mod index;
mod llm;
mod loader;
mod ranker;
mod retriever;
mod server;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::index::IndexBuilder;
use crate::llm::InferenceClient;
use crate::loader::FileStore;
use crate::retriever::Retriever;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env());
    let client = Arc::new(InferenceClient::new(&config)?);
    let store = Arc::new(FileStore::new(
        config.csv_path.clone(),
        config.pdf_path.clone(),
    ));

    let shared_index = index::new_shared_index();

    // One build per process lifetime; requests arriving before it finishes
    // get an index-not-ready answer path instead of blocking.
    let builder = IndexBuilder::new(
        store,
        client.clone(),
        config.chunk_policy(),
        config.max_embed_chars,
    );
    let build_state = shared_index.clone();
    tokio::spawn(async move {
        builder.run(build_state).await;
    });

    let retriever = Arc::new(Retriever::new(
        client.clone(),
        shared_index.clone(),
        config.top_k,
        config.max_query_chars,
    ));

    let app = server::router(AppState {
        retriever,
        generator: client,
        index: shared_index,
        config: config.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "serving document q&a");
    axum::serve(listener, app).await?;

    Ok(())
}
