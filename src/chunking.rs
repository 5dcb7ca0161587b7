//! Troceado de documentos en ventanas de tamaño fijo con solapamiento.
//!
//! Cada chunk es un tramo contiguo del texto de la página. El corte se
//! hace en el último límite semántico que cabe en la ventana (párrafo,
//! luego frase, luego espacio) y sólo si no hay ninguno se corta a mitad
//! de palabra. Dos chunks consecutivos comparten exactamente `overlap`
//! caracteres, de modo que el texto original se puede reconstruir.

use serde_json::Value;

use crate::models::{Chunk, Document};

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    /// `chunk_overlap` se recorta para que siempre haya avance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Devuelve los tramos `[inicio, fin)` en índices de carácter.
    pub fn split_spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        if chars.is_empty() {
            return spans;
        }

        let mut start = 0;
        loop {
            let limit = (start + self.chunk_size).min(chars.len());
            if limit == chars.len() {
                spans.push((start, limit));
                break;
            }

            let end = self.find_break(chars, start, limit);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
        spans
    }

    /// Busca el mejor punto de corte en `(start + overlap, limit]`.
    fn find_break(&self, chars: &[char], start: usize, limit: usize) -> usize {
        let min_end = start + self.chunk_overlap + 1;

        let last_match = |pred: &dyn Fn(usize) -> bool| (min_end..=limit).rev().find(|&end| pred(end));

        let paragraph = |end: usize| end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n';
        let sentence = |end: usize| {
            end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
        };
        let word = |end: usize| chars[end - 1].is_whitespace();

        last_match(&paragraph)
            .or_else(|| last_match(&sentence))
            .or_else(|| last_match(&word))
            .unwrap_or(limit)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.split_spans(&chars)
            .into_iter()
            .map(|(start, end)| chars[start..end].iter().collect())
            .collect()
    }

    /// Trocea cada documento conservando su orden y sus metadatos. Las
    /// páginas vacías o sólo con espacios no producen chunks.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in docs {
            if doc.page_content.trim().is_empty() {
                continue;
            }
            let chars: Vec<char> = doc.page_content.chars().collect();
            for (start, end) in self.split_spans(&chars) {
                let mut metadata = doc.metadata.clone();
                metadata.insert("start_index".to_string(), Value::from(start as u64));
                chunks.push(Chunk {
                    text: chars[start..end].iter().collect(),
                    metadata,
                });
            }
        }
        chunks
    }
}

/// Reconstruye el texto original a partir de sus chunks consecutivos.
pub fn merge_chunks(chunks: &[String], overlap: usize) -> String {
    let mut merged = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            merged.push_str(chunk);
        } else {
            merged.extend(chunk.chars().skip(overlap));
        }
    }
    merged
}
