//! Cliente REST de Pinecone: plano de control (crear/describir índices) y
//! plano de datos (estadísticas, upsert y consulta de vectores).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::config::PineconeConfig;
use crate::models::{IndexRecord, Metadata, ScoredRecord};
use crate::vector_store::VectorIndex;

const API_VERSION: &str = "2024-07";

/// Clave de metadatos donde se guarda el texto del chunk.
pub const TEXT_KEY: &str = "text";

/// Máximo de vectores por petición de upsert.
pub const UPSERT_BATCH_SIZE: usize = 100;

const READY_POLL_ATTEMPTS: u32 = 120;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Parámetros con los que debe existir el índice.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexStatus {
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub host: String,
    pub status: IndexStatus,
}

impl IndexDescription {
    /// Un índice existente con otra dimensión o métrica no es utilizable.
    pub fn check_compatible(&self, spec: &IndexSpec) -> Result<()> {
        if self.dimension != spec.dimension {
            return Err(anyhow!(
                "El índice '{}' tiene dimensión {} pero se requiere {}",
                self.name,
                self.dimension,
                spec.dimension
            ));
        }
        if !self.metric.eq_ignore_ascii_case(&spec.metric) {
            return Err(anyhow!(
                "El índice '{}' usa la métrica '{}' pero se requiere '{}'",
                self.name,
                self.metric,
                spec.metric
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Metadata,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

/// Convierte la respuesta en error si el estado HTTP no es de éxito.
async fn error_for_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("Pinecone devolvió {status} en {what}: {body}"))
}

/// Cliente del plano de control.
#[derive(Clone)]
pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    control_url: Url,
    ready_attempts: u32,
    ready_interval: Duration,
}

impl PineconeClient {
    pub fn new(api_key: &str, control_url: &str) -> Result<Self> {
        // Sin barra final, `Url::join` sustituiría el último segmento de la ruta.
        let normalized = if control_url.ends_with('/') {
            control_url.to_string()
        } else {
            format!("{control_url}/")
        };
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            control_url: Url::parse(&normalized)
                .with_context(|| format!("URL de control de Pinecone inválida: {control_url}"))?,
            ready_attempts: READY_POLL_ATTEMPTS,
            ready_interval: READY_POLL_INTERVAL,
        })
    }

    /// Ajusta cuántas veces y cada cuánto se consulta si el índice está listo.
    pub fn with_ready_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.ready_attempts = attempts.max(1);
        self.ready_interval = interval;
        self
    }

    pub fn from_config(cfg: &PineconeConfig) -> Result<Self> {
        Self::new(&cfg.api_key, &cfg.control_url)
    }

    fn indexes_url(&self) -> Result<Url> {
        Ok(self.control_url.join("indexes")?)
    }

    /// `None` si el índice no existe.
    pub async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let url = self.control_url.join(&format!("indexes/{name}"))?;
        let response = self
            .http
            .get(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .context("Error de red describiendo el índice")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response, "describe_index").await?;
        Ok(Some(response.json().await?))
    }

    pub async fn has_index(&self, name: &str) -> Result<bool> {
        Ok(self.describe_index(name).await?.is_some())
    }

    pub async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let body = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: &spec.metric,
            spec: json!({ "serverless": { "cloud": spec.cloud, "region": spec.region } }),
        };

        let response = self
            .http
            .post(self.indexes_url()?)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Error de red creando el índice")?;

        // 409: otro proceso lo creó entre la comprobación y la creación.
        if response.status() == StatusCode::CONFLICT {
            info!("El índice '{}' ya había sido creado.", spec.name);
            return Ok(());
        }
        error_for_status(response, "create_index").await?;
        info!("Índice '{}' creado ({}D, {}).", spec.name, spec.dimension, spec.metric);
        Ok(())
    }

    /// Espera a que el índice esté listo para recibir peticiones.
    pub async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        for attempt in 1..=self.ready_attempts {
            match self.describe_index(name).await? {
                Some(desc) if desc.status.ready => return Ok(desc),
                Some(desc) => debug!(attempt, state = %desc.status.state, "índice aún no está listo"),
                None => debug!(attempt, "índice aún no visible"),
            }
            tokio::time::sleep(self.ready_interval).await;
        }
        Err(anyhow!("El índice '{name}' no estuvo listo a tiempo"))
    }

    /// Crea el índice si no existe y devuelve un cliente del plano de datos.
    pub async fn ensure_index(&self, spec: &IndexSpec) -> Result<PineconeIndex> {
        let desc = match self.describe_index(&spec.name).await? {
            Some(desc) => {
                info!("Índice '{}' ya existe.", spec.name);
                desc.check_compatible(spec)?;
                if desc.status.ready {
                    desc
                } else {
                    self.wait_until_ready(&spec.name).await?
                }
            }
            None => {
                self.create_index(spec).await?;
                self.wait_until_ready(&spec.name).await?
            }
        };
        self.index(&desc.host)
    }

    /// Cliente del plano de datos para un host de índice.
    pub fn index(&self, host: &str) -> Result<PineconeIndex> {
        Ok(PineconeIndex {
            http: self.http.clone(),
            api_key: self.api_key.clone(),
            base_url: data_plane_url(host)?,
        })
    }

    /// Conecta con un índice que ya debe existir (usado por el servidor).
    pub async fn connect_existing(&self, name: &str) -> Result<PineconeIndex> {
        let desc = self
            .describe_index(name)
            .await?
            .ok_or_else(|| anyhow!("El índice '{name}' no existe; ejecute antes store_index"))?;
        self.index(&desc.host)
    }
}

/// Pinecone devuelve el host sin esquema; se asume https salvo que venga uno.
pub fn data_plane_url(host: &str) -> Result<Url> {
    let raw = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    Url::parse(&raw).with_context(|| format!("Host de índice inválido: {host}"))
}

/// Cliente del plano de datos de un índice concreto.
#[derive(Clone)]
pub struct PineconeIndex {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl PineconeIndex {
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.base_url.join(path)?;
        let response = self
            .http
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Error de red en {path}"))?;
        error_for_status(response, path).await
    }
}

/// Metadatos tal y como se guardan en Pinecone: texto incluido y sin nulos
/// (Pinecone no acepta valores null).
fn record_metadata(record: &IndexRecord) -> Metadata {
    let mut metadata: Metadata = record
        .metadata
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    metadata.insert(TEXT_KEY.to_string(), Value::String(record.text.clone()));
    metadata
}

fn scored_from_match(m: QueryMatch) -> ScoredRecord {
    let mut metadata = m.metadata.unwrap_or_default();
    let text = match metadata.remove(TEXT_KEY) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    ScoredRecord {
        id: m.id,
        score: m.score,
        text,
        metadata,
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn total_vector_count(&self) -> Result<u64> {
        let stats: IndexStats = self.post("describe_index_stats", &json!({})).await?.json().await?;
        Ok(stats.total_vector_count)
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let body = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| PineconeVector {
                        id: &r.id,
                        values: &r.vector,
                        metadata: record_metadata(r),
                    })
                    .collect(),
            };
            self.post("vectors/upsert", &body).await?;
            debug!(count = batch.len(), "upserted vectors to pinecone");
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response: QueryResponse = self.post("query", &body).await?.json().await?;
        Ok(response.matches.into_iter().map(scored_from_match).collect())
    }
}
