//! Abstracción sobre Rig para las llamadas de chat de los agentes.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ConfigError, CrewError};

/// Backend de completions: recibe el preámbulo del agente y el prompt de la tarea.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, CrewError>;
}

/// Chat de OpenAI vía Rig. Requiere `OPENAI_API_KEY`.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    chat_model: String,
}

impl OpenAiCompletion {
    pub fn from_env(chat_model: impl Into<String>) -> Result<Self, CrewError> {
        if std::env::var("OPENAI_API_KEY").map(|k| k.trim().is_empty()).unwrap_or(true) {
            return Err(ConfigError::MissingKeys(vec!["OPENAI_API_KEY".into()]).into());
        }
        Ok(Self {
            chat_model: chat_model.into(),
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, CrewError> {
        use rig::client::{CompletionClient as _, ProviderClient as _};
        use rig::completion::Prompt;
        use rig::providers::openai;

        let client = openai::Client::from_env();
        let agent = client.agent(&self.chat_model).preamble(preamble).build();

        debug!(model = %self.chat_model, prompt_len = prompt.len(), "Llamando al LLM");
        let answer = agent
            .prompt(prompt)
            .await
            .map_err(|e| CrewError::Completion(e.to_string()))?;
        Ok(answer)
    }
}
