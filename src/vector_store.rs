//! Abstracción del índice vectorial y una implementación en memoria.
//!
//! API pública:
//!   - `VectorIndex` (implementado por Pinecone y por `InMemoryIndex`)
//!   - `cosine_similarity(&[f32], &[f32])`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{IndexRecord, ScoredRecord};

/// Métrica del índice. Sólo se usa coseno.
pub const METRIC_COSINE: &str = "cosine";

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Número total de registros almacenados.
    async fn total_vector_count(&self) -> Result<u64>;

    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Los `top_k` registros más similares, de mayor a menor similitud.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>>;
}

/// Similitud coseno; 0.0 si alguno de los vectores es nulo.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Índice en memoria con búsqueda exhaustiva por coseno. Los empates
/// conservan el orden de inserción.
#[derive(Debug)]
pub struct InMemoryIndex {
    dimension: usize,
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn total_vector_count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(anyhow!(
                "El registro {} tiene dimensión {} y el índice {}",
                bad.id,
                bad.vector.len(),
                self.dimension
            ));
        }

        let mut stored = self.records.write().await;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read().await;
        let mut scored: Vec<ScoredRecord> = stored
            .iter()
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                score: cosine_similarity(&r.vector, vector),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
            })
            .collect();

        // sort_by es estable: los empates mantienen el orden de inserción.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}
