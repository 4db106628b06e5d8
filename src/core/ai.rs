// language model clients - openai chat completions and claude messages

use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const OPENAI_URL: &str = "https://api.openai.com";
const CLAUDE_URL: &str = "https://api.anthropic.com/v1/messages";

/// One completion round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub user: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Provider {
    #[default]
    #[value(name = "openai")]
    OpenAI,
    Claude,
}

impl Provider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-3.5-turbo",
            Provider::Claude => "claude-sonnet-4-20250514",
        }
    }

    /// The key is checked per call, so a server can start without one.
    pub fn client(&self, api_key: &str) -> Arc<dyn LanguageModel> {
        match self {
            Provider::OpenAI => Arc::new(OpenAi::new(api_key)),
            Provider::Claude => Arc::new(Claude::new(api_key)),
        }
    }
}

// ---- openai ----

pub struct OpenAi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl OpenAi {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: OPENAI_URL.to_string(),
        }
    }

    /// Point at an openai-compatible server instead of api.openai.com.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAi {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Error> {
        if self.api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message {
                role: "system",
                content: system,
            });
        }
        messages.push(Message {
            role: "user",
            content: &request.user,
        });

        let body = ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %request.model, max_tokens = request.max_tokens, "openai completion");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = response.text().await?;
            return Err(Error::Llm(error));
        }

        let response: ChatResponse = response.json().await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(Error::EmptyCompletion)?;

        Ok(Completion {
            text: choice.message.content,
            model: if response.model.is_empty() {
                request.model
            } else {
                response.model
            },
            usage: response.usage,
        })
    }
}

// ---- claude ----

pub struct Claude {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    content: Vec<Content>,
    #[serde(default)]
    usage: ClaudeUsage,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// claude reports no total
impl From<ClaudeUsage> for Usage {
    fn from(usage: ClaudeUsage) -> Self {
        Self {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
        }
    }
}

impl Claude {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for Claude {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Error> {
        if self.api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.user,
            }],
        };

        debug!(model = %request.model, max_tokens = request.max_tokens, "claude completion");

        let response = self
            .client
            .post(CLAUDE_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = response.text().await?;
            return Err(Error::Llm(error));
        }

        let response: MessagesResponse = response.json().await?;
        let content = response
            .content
            .into_iter()
            .next()
            .ok_or(Error::EmptyCompletion)?;

        Ok(Completion {
            text: content.text,
            model: if response.model.is_empty() {
                request.model
            } else {
                response.model
            },
            usage: response.usage.into(),
        })
    }
}
