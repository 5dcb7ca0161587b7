//! Consulta RAG: recuperación de chunks en el índice vectorial y síntesis
//! de la respuesta con el LLM.
//!
//! Flujo:
//!   1. Embedding de la pregunta con el mismo modelo usado al indexar.
//!   2. Búsqueda de los `top_k` chunks más similares (coseno).
//!   3. Concatenación de sus textos como contexto del prompt de sistema.
//!   4. El LLM responde usando sólo ese contexto.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::{embedding::Embedder, llm::ChatModel, models::ScoredRecord, vector_store::VectorIndex};

/// Número de chunks recuperados por pregunta.
pub const DEFAULT_TOP_K: usize = 3;

pub const SYSTEM_PROMPT: &str = "You are a Medical assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\n{context}";

/// Respuesta cuando el modelo no devuelve texto.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't generate a response.";

/// Recupera los registros más relevantes para una pregunta.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self { embedder, index, top_k }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredRecord>> {
        let vector = self.embedder.embed_query(query).await?;
        let records = self.index.query(&vector, self.top_k).await?;
        debug!(hits = records.len(), "chunks recuperados");
        Ok(records)
    }
}

/// Une los textos recuperados separados por una línea en blanco.
pub fn build_context(records: &[ScoredRecord]) -> String {
    records
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_system_prompt(context: &str) -> String {
    SYSTEM_PROMPT.replace("{context}", context)
}

/// Cadena completa recuperación + generación.
#[derive(Clone)]
pub struct RagChain {
    retriever: Retriever,
    chat_model: Arc<dyn ChatModel>,
}

impl RagChain {
    pub fn new(retriever: Retriever, chat_model: Arc<dyn ChatModel>) -> Self {
        Self { retriever, chat_model }
    }

    /// Responde a `question`. Cualquier error del embedder, del índice o
    /// del LLM se propaga sin reintentos.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let records = self.retriever.retrieve(question).await?;
        let system_prompt = build_system_prompt(&build_context(&records));

        let answer = self.chat_model.complete(&system_prompt, question).await?;
        if answer.trim().is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndexRecord, Metadata};
    use crate::vector_store::InMemoryIndex;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Embedder determinista: vector según palabras clave.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("paracetamol") { 1.0 } else { 0.0 },
                        if t.contains("insulin") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "keyword"
        }
    }

    /// Modelo que guarda el prompt recibido y devuelve una respuesta fija.
    struct RecordingModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, system_prompt: &str, _question: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(system_prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _system_prompt: &str, _question: &str) -> Result<String> {
            Err(anyhow!("quota exceeded"))
        }
    }

    async fn seeded_index() -> Arc<InMemoryIndex> {
        let index = Arc::new(InMemoryIndex::new(3));
        let texts = [
            "Paracetamol is used to treat pain and fever",
            "Insulin regulates blood glucose",
            "Aspirin thins the blood",
            "Rest and hydration help recovery",
        ];
        let vectors = KeywordEmbedder
            .embed_documents(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let records: Vec<IndexRecord> = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| IndexRecord {
                id: i.to_string(),
                vector,
                text: text.to_string(),
                metadata: Metadata::new(),
            })
            .collect();
        index.upsert(&records).await.unwrap();
        index
    }

    #[tokio::test]
    async fn retriever_returns_top_three_with_best_first() {
        let retriever = Retriever::new(Arc::new(KeywordEmbedder), seeded_index().await, DEFAULT_TOP_K);
        let hits = retriever.retrieve("What is paracetamol used for?").await.unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "Paracetamol is used to treat pain and fever");
    }

    #[tokio::test]
    async fn chain_puts_retrieved_context_in_prompt() {
        let model = Arc::new(RecordingModel {
            reply: "It treats pain and fever.".into(),
            prompts: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(Arc::new(KeywordEmbedder), seeded_index().await, DEFAULT_TOP_K);
        let chain = RagChain::new(retriever, model.clone());

        let answer = chain.answer("What is paracetamol used for?").await.unwrap();
        assert_eq!(answer, "It treats pain and fever.");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("You are a Medical assistant"));
        assert!(prompts[0].contains("Paracetamol is used to treat pain and fever"));
        assert!(!prompts[0].contains("{context}"));
    }

    #[tokio::test]
    async fn blank_answer_falls_back() {
        let model = Arc::new(RecordingModel {
            reply: "  ".into(),
            prompts: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(Arc::new(KeywordEmbedder), seeded_index().await, DEFAULT_TOP_K);
        let chain = RagChain::new(retriever, model);
        assert_eq!(chain.answer("anything").await.unwrap(), FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn llm_errors_propagate() {
        let retriever = Retriever::new(Arc::new(KeywordEmbedder), seeded_index().await, DEFAULT_TOP_K);
        let chain = RagChain::new(retriever, Arc::new(FailingModel));
        tokio_test::assert_err!(chain.answer("paracetamol?").await);
    }

    #[test]
    fn context_joins_texts_with_blank_line() {
        let records = vec![
            ScoredRecord { id: "1".into(), score: 0.9, text: "a".into(), metadata: Metadata::new() },
            ScoredRecord { id: "2".into(), score: 0.8, text: "b".into(), metadata: Metadata::new() },
        ];
        assert_eq!(build_context(&records), "a\n\nb");
        assert_eq!(build_context(&[]), "");
    }
}
