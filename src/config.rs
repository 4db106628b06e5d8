// runtime settings, filled in by the cli from flags and env vars

use crate::core::{PipelineConfig, Provider, SmartChat, Supabase};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: Provider,
    pub api_key: String,
    /// Falls back to the provider's default model.
    pub model: Option<String>,
    /// Budget for plain chat.
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub storage: StorageSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAI,
            api_key: String::new(),
            model: None,
            max_tokens: 150,
            temperature: 0.7,
        }
    }
}

impl Settings {
    pub fn model(&self) -> String {
        self.llm
            .model
            .clone()
            .unwrap_or_else(|| self.llm.provider.default_model().to_string())
    }

    /// Missing pieces worth telling the operator about. Nothing here is fatal
    /// until a request actually needs the collaborator.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.storage.url.is_empty() {
            warnings.push("SUPABASE_URL not configured".to_string());
        }
        if self.storage.api_key.is_empty() {
            warnings.push("SUPABASE_API_KEY not configured".to_string());
        }
        if self.llm.api_key.is_empty() {
            warnings.push(match self.llm.provider {
                Provider::OpenAI => "OPENAI_API_KEY not configured".to_string(),
                Provider::Claude => "ANTHROPIC_API_KEY not configured".to_string(),
            });
        }

        warnings
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            model: self.model(),
            chat_max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            ..PipelineConfig::default()
        }
    }

    /// Wire up the real collaborators.
    pub fn smart_chat(&self) -> SmartChat {
        let llm = self.llm.provider.client(&self.llm.api_key);
        let store = Supabase::new(&self.storage.url, &self.storage.api_key);

        SmartChat::new(llm, Arc::new(store), self.pipeline_config())
    }
}
