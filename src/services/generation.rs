//! Text generation over OpenAI-compatible chat-completion APIs.
//!
//! Both backends speak the same wire format; they differ in endpoint,
//! credentials, model naming and sampling parameters. Every call is a single
//! request with no retry, bounded by the configured generation timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::prompt::PromptPair;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Symbolic model names accepted from clients, mapped to OpenAI model ids.
const OPENAI_MODELS: &[(&str, &str)] = &[
    ("gpt41", "gpt-4-1106-preview"),
    ("gpt4", "gpt-4"),
    ("auto", DEFAULT_OPENAI_MODEL),
    ("o3mini", "gpt-3.5-turbo"),
];

pub fn resolve_openai_model(model_key: &str) -> &'static str {
    OPENAI_MODELS
        .iter()
        .find(|(key, _)| *key == model_key)
        .map(|(_, model)| *model)
        .unwrap_or(DEFAULT_OPENAI_MODEL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelector {
    OpenAi,
    DeepSeek,
}

impl BackendSelector {
    /// `deepseek` selects DeepSeek; every other key is an OpenAI model key.
    pub fn from_model_key(model_key: &str) -> Self {
        if model_key.trim().eq_ignore_ascii_case("deepseek") {
            BackendSelector::DeepSeek
        } else {
            BackendSelector::OpenAi
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Issue exactly one generation call and return the raw text.
    async fn generate(&self, prompt: &PromptPair, model_key: &str) -> AppResult<String>;
}

/// Connection and sampling settings of one backend.
#[derive(Debug, Clone)]
pub struct ChatBackend {
    pub name: &'static str,
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatBackend {
    pub fn openai(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: "OpenAI",
            api_key,
            base_url: base_url.into(),
            temperature: 0.8,
            max_tokens: 1000,
        }
    }

    pub fn deepseek(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: "DeepSeek",
            api_key,
            base_url: base_url.into(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Pull a provider's `error.message` out of a failure body, if it has one.
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_default()
}

pub struct GenerationClient {
    http: reqwest::Client,
    openai: ChatBackend,
    deepseek: ChatBackend,
    deepseek_model: String,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(
        http: reqwest::Client,
        openai: ChatBackend,
        deepseek: ChatBackend,
        deepseek_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            openai,
            deepseek,
            deepseek_model: deepseek_model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        Self::new(
            http,
            ChatBackend::openai(config.openai.api_key.clone(), &config.openai.base_url),
            ChatBackend::deepseek(config.deepseek.api_key.clone(), &config.deepseek.base_url),
            &config.deepseek.model,
            Duration::from_secs(config.http.generation_timeout_seconds),
        )
    }

    fn backend(&self, selector: BackendSelector) -> (&ChatBackend, &str) {
        match selector {
            BackendSelector::OpenAi => (&self.openai, ""),
            BackendSelector::DeepSeek => (&self.deepseek, self.deepseek_model.as_str()),
        }
    }
}

#[async_trait]
impl TextGenerator for GenerationClient {
    async fn generate(&self, prompt: &PromptPair, model_key: &str) -> AppResult<String> {
        let selector = BackendSelector::from_model_key(model_key);
        let (backend, fixed_model) = self.backend(selector);
        let model = match selector {
            BackendSelector::OpenAi => resolve_openai_model(model_key),
            BackendSelector::DeepSeek => fixed_model,
        };

        let api_key = backend.api_key.as_deref().ok_or_else(|| {
            AppError::Config(format!("{} API key is not configured", backend.name))
        })?;

        tracing::debug!("Using {} model: {}", backend.name, model);

        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: backend.temperature,
            max_tokens: backend.max_tokens,
        };
        let url = format!("{}/chat/completions", backend.base_url.trim_end_matches('/'));

        let call = async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| AppError::from_transport(backend.name, e))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| AppError::from_transport(backend.name, e))?;
            Ok::<_, AppError>((status, text))
        };

        let (status, text) = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "{} generation timed out after {} ms",
                    backend.name,
                    self.timeout.as_millis()
                ))
            })??;

        if !status.is_success() {
            tracing::warn!("{} returned HTTP {}", backend.name, status);
            return Err(AppError::upstream(
                backend.name,
                provider_error_message(&text),
            ));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            AppError::upstream(backend.name, format!("Unexpected response body: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::upstream(backend.name, "Empty completion"))
    }
}
