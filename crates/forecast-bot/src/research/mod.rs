//! Research providers and provider selection
//!
//! Exactly one provider is picked at startup from configuration and then
//! injected into the orchestrator.

mod asknews;
mod exa;
mod llm;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use forecast_core::{NullResearch, Question, ResearchProvider};
use reqwest::Client;

use crate::config::{AppConfig, ResearchChoice, ResearchConfig};
use crate::error::{BotError, Result};
use crate::llm::ChatClient;

use asknews::AskNewsResearch;
use exa::ExaResearch;
use llm::ChatResearch;

const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Instructions shared by the chat-based providers
pub(crate) const RESEARCH_SYSTEM_PROMPT: &str = "You are an assistant to a superforecaster. \
The superforecaster will give you a question they intend to forecast on. \
To be a great assistant, you generate a concise but detailed rundown of the most relevant news, \
including if the question would resolve Yes or No based on current information. \
You do not produce forecasts yourself.";

/// The resolved provider variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchProviderKind {
    AskNews,
    Exa,
    Perplexity,
    Llm,
    None,
}

impl fmt::Display for ResearchProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchProviderKind::AskNews => "asknews",
            ResearchProviderKind::Exa => "exa",
            ResearchProviderKind::Perplexity => "perplexity",
            ResearchProviderKind::Llm => "llm",
            ResearchProviderKind::None => "none",
        };
        f.write_str(name)
    }
}

impl ResearchProviderKind {
    /// Explicit choice wins; `auto` takes the first provider with credentials
    pub fn resolve(config: &ResearchConfig) -> Self {
        match config.provider {
            ResearchChoice::Asknews => ResearchProviderKind::AskNews,
            ResearchChoice::Exa => ResearchProviderKind::Exa,
            ResearchChoice::Perplexity => ResearchProviderKind::Perplexity,
            ResearchChoice::Llm => ResearchProviderKind::Llm,
            ResearchChoice::None => ResearchProviderKind::None,
            ResearchChoice::Auto => {
                if config.asknews_client_id.is_some() && config.asknews_secret.is_some() {
                    ResearchProviderKind::AskNews
                } else if config.exa_api_key.is_some() {
                    ResearchProviderKind::Exa
                } else if config.perplexity_api_key.is_some() {
                    ResearchProviderKind::Perplexity
                } else {
                    ResearchProviderKind::None
                }
            }
        }
    }
}

/// Build the configured provider
pub fn build_provider(
    kind: ResearchProviderKind,
    http: Client,
    config: &AppConfig,
) -> Result<Arc<dyn ResearchProvider>> {
    let research = &config.research;
    let timeout = Duration::from_secs(research.timeout_seconds);

    let provider: Arc<dyn ResearchProvider> = match kind {
        ResearchProviderKind::AskNews => {
            let client_id = research
                .asknews_client_id
                .as_deref()
                .ok_or(BotError::MissingCredential("ASKNEWS_CLIENT_ID"))?;
            let secret = research
                .asknews_secret
                .as_deref()
                .ok_or(BotError::MissingCredential("ASKNEWS_SECRET"))?;
            Arc::new(AskNewsResearch::new(http, client_id, secret, timeout))
        }
        ResearchProviderKind::Exa => {
            let api_key = research
                .exa_api_key
                .as_deref()
                .ok_or(BotError::MissingCredential("EXA_API_KEY"))?;
            Arc::new(ExaResearch::new(http, api_key, timeout))
        }
        ResearchProviderKind::Perplexity => {
            let api_key = research
                .perplexity_api_key
                .as_deref()
                .ok_or(BotError::MissingCredential("PERPLEXITY_API_KEY"))?;
            let chat = ChatClient::new(
                http,
                PERPLEXITY_BASE_URL,
                api_key,
                &research.perplexity_model,
                timeout,
                config.llm.max_retries,
            );
            Arc::new(ChatResearch::perplexity(chat))
        }
        ResearchProviderKind::Llm => {
            let chat = ChatClient::from_config(http, &config.llm)?.with_model(&research.model);
            Arc::new(ChatResearch::llm(chat, research.temperature))
        }
        ResearchProviderKind::None => Arc::new(NullResearch),
    };

    tracing::info!(provider = %kind, "Research provider selected");
    Ok(provider)
}

/// Question text plus resolution details, used as the research query
pub(crate) fn research_query(question: &Question) -> String {
    let mut parts = vec![format!("The question is: {}", question.title.trim())];
    if !question.resolution_criteria.trim().is_empty() {
        parts.push(format!(
            "This question's outcome will be determined by the specific criteria below:\n{}",
            question.resolution_criteria.trim()
        ));
    }
    if !question.fine_print.trim().is_empty() {
        parts.push(format!("Fine Print: {}", question.fine_print.trim()));
    }
    parts.join("\n\n")
}
