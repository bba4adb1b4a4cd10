//! OpenAI-compatible chat completion client
//!
//! Used for prediction runs (OpenRouter by default) and by the research
//! providers that are themselves chat endpoints.

use std::time::Duration;

use async_trait::async_trait;
use forecast_core::{ForecastResult, ModelClient};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{check_status, BotError, Result};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat completion client bound to one endpoint and default model
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl ChatClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
            max_retries,
        }
    }

    /// Client for the prediction model
    pub fn from_config(http: Client, config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(BotError::MissingCredential("OPENROUTER_API_KEY"))?;
        Ok(Self::new(
            http,
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_seconds),
            config.max_retries,
        ))
    }

    /// Same endpoint, different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one conversation, retrying rate limits and server errors
    pub async fn chat(
        &self,
        system: Option<&str>,
        prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send(system, prompt, temperature).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff(attempt);
                    tracing::warn!(
                        model = %self.model,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, system: Option<&str>, prompt: &str, temperature: f32) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: supports_temperature(&self.model).then_some(temperature),
            stream: false,
        };

        tracing::debug!(model = %self.model, temperature, "Calling model");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let body: ChatResponse = check_status(response).await?.json().await?;
        let answer = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BotError::UnexpectedResponse("no answer returned from model".into()))?;

        tracing::debug!(model = %self.model, chars = answer.len(), "Model response received");
        Ok(answer)
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> ForecastResult<String> {
        self.chat(None, prompt, temperature)
            .await
            .map_err(BotError::into_model_call)
    }
}

/// Reasoning and deep-research models reject a temperature parameter
fn supports_temperature(model: &str) -> bool {
    let name = model.rsplit('/').next().unwrap_or(model);
    !(name.starts_with("o1") || name.starts_with("o3") || name.starts_with("o4")
        || name.contains("deep-research"))
}

fn backoff(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(1 << attempt.min(10));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}
