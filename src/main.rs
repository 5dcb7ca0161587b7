use std::sync::Arc;

use axum::Router;
use medical_rag_chatbot::{
    api,
    app_state::AppState,
    config::AppConfig,
    embedding::FastEmbedder,
    llm::GeminiChat,
    pinecone::PineconeClient,
    rag::{RagChain, Retriever, DEFAULT_TOP_K},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 2. Cargar configuración: sin las claves no se arranca
    let cfg = AppConfig::from_env().inspect_err(|e| error!("❌ {e}"))?;

    // 3. Servicios compartidos, creados una sola vez
    let embedder = Arc::new(FastEmbedder::new(&cfg.embedding_model)?);
    let pinecone = PineconeClient::from_config(&cfg.pinecone)?;
    let index = Arc::new(pinecone.connect_existing(&cfg.pinecone.index_name).await?);
    let chat_model = Arc::new(GeminiChat::from_config(&cfg));

    let retriever = Retriever::new(embedder, index, DEFAULT_TOP_K);
    let app_state = AppState::new(RagChain::new(retriever, chat_model));

    // 4. Router con CORS abierto para el frontend
    let app = Router::new().merge(api::create_router(app_state)).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 5. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr).await?;
    info!("🚀 Servidor escuchando en http://{}", cfg.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
