//! Carga y gestión de configuración de la aplicación (Pinecone + Gemini + embeddings).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_INDEX_NAME: &str = "medical-chatbot-project";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-flash-latest";

/// Lee una variable obligatoria. Una cadena vacía cuenta como ausente.
fn required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow!("Falta {key} en el entorno")),
    }
}

fn optional(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Credenciales y ubicación del índice en Pinecone.
#[derive(Clone, Debug)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
    pub control_url: String,
}

impl PineconeConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required("PINECONE_API_KEY")?,
            index_name: optional("PINECONE_INDEX_NAME", DEFAULT_INDEX_NAME),
            cloud: optional("PINECONE_CLOUD", "aws"),
            region: optional("PINECONE_REGION", "us-east-1"),
            control_url: optional("PINECONE_CONTROL_URL", "https://api.pinecone.io"),
        })
    }
}

/// Configuración completa del servidor de chat.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pinecone: PineconeConfig,
    pub google_api_key: String,
    pub server_addr: String,
    pub llm_chat_model: String,
    pub llm_temperature: f64,
    pub embedding_model: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let pinecone = PineconeConfig::from_env()?;
        let google_api_key = required("GOOGLE_API_KEY")?;

        let llm_temperature = optional("LLM_TEMPERATURE", "0.2")
            .parse::<f64>()
            .context("LLM_TEMPERATURE no es un número válido")?;

        Ok(Self {
            pinecone,
            google_api_key,
            server_addr: optional("SERVER_ADDR", "0.0.0.0:8000"),
            llm_chat_model: optional("LLM_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            llm_temperature,
            embedding_model: optional("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
        })
    }
}

/// Configuración del constructor de índice. No necesita la clave del LLM.
#[derive(Clone, Debug)]
pub struct BuilderConfig {
    pub pinecone: PineconeConfig,
    pub embedding_model: String,
    pub data_dir: PathBuf,
}

impl BuilderConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            pinecone: PineconeConfig::from_env()?,
            embedding_model: optional("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            data_dir: PathBuf::from(optional("DATA_DIR", "data/")),
        })
    }
}
