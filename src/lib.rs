//! Chatbot RAG sobre PDFs médicos: indexación en Pinecone y respuestas
//! con Gemini a partir de los chunks recuperados.

pub mod api;
pub mod app_state;
pub mod chunking;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod index_builder;
pub mod llm;
pub mod models;
pub mod pinecone;
pub mod rag;
pub mod vector_store;
