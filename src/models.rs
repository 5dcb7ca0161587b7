//! Modelos de dominio: documentos, chunks y registros del índice vectorial.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadatos libres asociados a documentos y registros.
pub type Metadata = Map<String, Value>;

/// Clave de metadatos que identifica el fichero de origen.
pub const SOURCE_KEY: &str = "source";

/// Unidad cargada desde un fichero fuente (una página de un PDF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }
}

/// Trozo de texto de un documento, unidad de recuperación.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
}

/// Registro persistido en el índice: vector + texto + metadatos.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// Registro devuelto por una búsqueda, con su similitud coseno.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
}
