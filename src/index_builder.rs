//! Construcción del índice: carga de PDFs, troceado, embeddings y carga
//! única en el índice vectorial.
//!
//! La carga sólo ocurre si el índice está vacío. Un índice con registros
//! se considera autoritativo aunque los PDFs hayan cambiado.

use std::path::Path;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::{
    chunking::TextSplitter,
    documents::{filter_to_minimal_docs, load_pdf_files},
    embedding::{Embedder, EMBED_BATCH_SIZE},
    models::{Chunk, IndexRecord},
    vector_store::VectorIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Populated,
    AlreadyPopulated,
}

/// Resumen de los resultados de una construcción del índice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub documents: usize,
    pub chunks: usize,
    pub records_written: usize,
    pub outcome: BuildOutcome,
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = match self.outcome {
            BuildOutcome::Populated => "índice poblado",
            BuildOutcome::AlreadyPopulated => "índice ya poblado, sin cambios",
        };
        write!(
            f,
            "Resumen: {} páginas, {} chunks, {} registros escritos ({}).",
            self.documents, self.chunks, self.records_written, outcome
        )
    }
}

/// Carga los PDFs de `data_dir` y los trocea.
pub fn prepare_chunks(data_dir: &Path, splitter: &TextSplitter) -> (usize, Vec<Chunk>) {
    let extracted = load_pdf_files(data_dir);
    let documents = extracted.len();
    let minimal = filter_to_minimal_docs(extracted);
    let chunks = splitter.split_documents(&minimal);
    info!("{} páginas cargadas, {} chunks generados.", documents, chunks.len());
    (documents, chunks)
}

/// Escribe los chunks en el índice sólo si está vacío.
pub async fn populate_if_empty(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
) -> Result<(BuildOutcome, usize)> {
    if index.total_vector_count().await? > 0 {
        info!("✅ Índice ya poblado → se usa el índice existente");
        return Ok((BuildOutcome::AlreadyPopulated, 0));
    }

    info!("Índice vacío → añadiendo {} chunks", chunks.len());
    let mut written = 0;
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_documents(&texts).await?;

        let records: Vec<IndexRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
            })
            .collect();

        index.upsert(&records).await?;
        written += records.len();
        info!("[{}/{}] chunks escritos", written, chunks.len());
    }

    Ok((BuildOutcome::Populated, written))
}

/// Ejecuta la construcción completa sobre un índice ya provisionado.
pub async fn run(
    data_dir: &Path,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
) -> Result<BuildSummary> {
    let (documents, chunks) = prepare_chunks(data_dir, &TextSplitter::default());
    let (outcome, records_written) = populate_if_empty(index, embedder, &chunks).await?;

    Ok(BuildSummary {
        documents,
        chunks: chunks.len(),
        records_written,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, SOURCE_KEY};
    use crate::vector_store::InMemoryIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                let mut metadata = Metadata::new();
                metadata.insert(SOURCE_KEY.into(), "data/guide.pdf".into());
                Chunk { text: format!("chunk number {i}"), metadata }
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_index_is_populated_in_batches() {
        let index = InMemoryIndex::new(2);
        let embedder = CountingEmbedder { calls: AtomicUsize::new(0) };

        let (outcome, written) = populate_if_empty(&index, &embedder, &chunks(70)).await.unwrap();

        assert_eq!(outcome, BuildOutcome::Populated);
        assert_eq!(written, 70);
        assert_eq!(index.total_vector_count().await.unwrap(), 70);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let index = InMemoryIndex::new(2);
        let embedder = CountingEmbedder { calls: AtomicUsize::new(0) };
        populate_if_empty(&index, &embedder, &chunks(5)).await.unwrap();
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);

        let (outcome, written) = populate_if_empty(&index, &embedder, &chunks(9)).await.unwrap();

        assert_eq!(outcome, BuildOutcome::AlreadyPopulated);
        assert_eq!(written, 0);
        assert_eq!(index.total_vector_count().await.unwrap(), 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn records_keep_chunk_text_and_source() {
        let index = InMemoryIndex::new(2);
        let embedder = CountingEmbedder { calls: AtomicUsize::new(0) };
        populate_if_empty(&index, &embedder, &chunks(1)).await.unwrap();

        let hits = index.query(&[14.0, 1.0], 3).await.unwrap();
        assert_eq!(hits[0].text, "chunk number 0");
        assert_eq!(hits[0].metadata[SOURCE_KEY], "data/guide.pdf");
    }

    #[tokio::test]
    async fn missing_data_dir_builds_nothing() {
        let index = InMemoryIndex::new(2);
        let embedder = CountingEmbedder { calls: AtomicUsize::new(0) };

        let summary = run(Path::new("/no/such/data"), &index, &embedder).await.unwrap();

        assert_eq!(summary.documents, 0);
        assert_eq!(summary.chunks, 0);
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.outcome, BuildOutcome::Populated);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(summary.to_string().contains("0 chunks"));
    }
}
