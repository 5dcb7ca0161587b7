//! Generación de embeddings con un modelo local (fastembed).
//!
//! El mismo `Embedder` se usa al construir el índice y al consultar, para
//! que los vectores de chunks y preguntas vivan en el mismo espacio.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

/// Dimensión de los vectores del modelo por defecto.
pub const EMBEDDING_DIMENSION: usize = 384;

/// Tamaño de lote al embeber chunks.
pub const EMBED_BATCH_SIZE: usize = 32;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Un vector por texto, en el mismo orden.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No se pudo generar embedding de la query"))
    }

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Embeddings locales con fastembed (ONNX). El modelo se descarga a la
/// caché local la primera vez.
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedder {
    pub fn new(model_name: &str) -> Result<Self> {
        let (model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                (EmbeddingModel::AllMiniLML6V2, 384)
            }
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            other => {
                return Err(anyhow!(
                    "Modelo de embeddings no soportado: {other}. Soportados: all-MiniLM-L6-v2, bge-small-en-v1.5"
                ))
            }
        };

        info!("Inicializando modelo de embeddings {model_name} ({dimension}D)...");
        let embedding = TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(true))
            .map_err(|e| anyhow!("Error inicializando el modelo de embeddings: {e}"))?;

        Ok(Self {
            model: Arc::new(embedding),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch_size = texts.len(), model = %self.model_name, "embedding batch");

        // La inferencia es CPU-bound: fuera del runtime async.
        let model = Arc::clone(&self.model);
        let inputs = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(inputs, Some(EMBED_BATCH_SIZE)))
            .await
            .context("La tarea de embeddings terminó de forma inesperada")?
            .map_err(|e| anyhow!("Error generando embeddings: {e}"))?;

        check_embeddings(&embeddings, texts.len(), self.dimension)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Verifica número y dimensión de los vectores devueltos por el modelo.
pub fn check_embeddings(embeddings: &[Vec<f32>], expected_len: usize, dimension: usize) -> Result<()> {
    if embeddings.len() != expected_len {
        return Err(anyhow!(
            "Número de embeddings ({}) distinto al número de textos ({})",
            embeddings.len(),
            expected_len
        ));
    }
    if let Some(bad) = embeddings.iter().find(|v| v.len() != dimension) {
        return Err(anyhow!(
            "Dimensión de embedding inesperada: se esperaba {dimension}, se obtuvo {}",
            bad.len()
        ));
    }
    Ok(())
}
