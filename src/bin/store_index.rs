//! Construye el índice vectorial a partir de los PDFs de `data/`.

use medical_rag_chatbot::{
    config::BuilderConfig,
    embedding::{Embedder, FastEmbedder},
    index_builder,
    pinecone::{IndexSpec, PineconeClient},
    vector_store::METRIC_COSINE,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = BuilderConfig::from_env()?;
    let embedder = FastEmbedder::new(&cfg.embedding_model)?;

    let spec = IndexSpec {
        name: cfg.pinecone.index_name.clone(),
        dimension: embedder.dimension(),
        metric: METRIC_COSINE.to_string(),
        cloud: cfg.pinecone.cloud.clone(),
        region: cfg.pinecone.region.clone(),
    };
    let client = PineconeClient::from_config(&cfg.pinecone)?;
    let index = client.ensure_index(&spec).await?;

    let summary = index_builder::run(&cfg.data_dir, &index, &embedder).await?;
    info!("{summary}");
    Ok(())
}
