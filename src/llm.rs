//! Abstracción sobre Rig para generar respuestas con Gemini.

use anyhow::Result;
use async_trait::async_trait;
use rig::client::CompletionClient as _;
use rig::completion::Prompt;
use rig::providers::gemini;
use tracing::debug;

use crate::config::AppConfig;

/// Modelo de lenguaje que responde a una pregunta dadas unas instrucciones.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, question: &str) -> Result<String>;
}

/// Cliente de Gemini construido una sola vez al arrancar.
pub struct GeminiChat {
    client: gemini::Client,
    model: String,
    temperature: f64,
}

impl GeminiChat {
    pub fn new(api_key: &str, model: &str, temperature: f64) -> Self {
        Self {
            client: gemini::Client::new(api_key),
            model: model.to_string(),
            temperature,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(&cfg.google_api_key, &cfg.llm_chat_model, cfg.llm_temperature)
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn complete(&self, system_prompt: &str, question: &str) -> Result<String> {
        debug!(model = %self.model, question_len = question.len(), "llamando a Gemini");

        let agent = self
            .client
            .agent(&self.model)
            .preamble(system_prompt)
            .temperature(self.temperature)
            .build();

        let answer = agent.prompt(question).await?;
        Ok(answer)
    }
}
