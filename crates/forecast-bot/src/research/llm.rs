//! Research delegated to a chat model (Perplexity's search models or a
//! deep-research model behind the prediction endpoint)

use async_trait::async_trait;
use forecast_core::{ForecastResult, Question, ResearchProvider, ResearchReport};

use super::{research_query, RESEARCH_SYSTEM_PROMPT};
use crate::error::BotError;
use crate::llm::ChatClient;

pub struct ChatResearch {
    chat: ChatClient,
    name: &'static str,
    temperature: f32,
    /// Send the instructions as a system message rather than inline
    system_message: bool,
}

impl ChatResearch {
    pub fn perplexity(chat: ChatClient) -> Self {
        Self {
            chat,
            name: "perplexity",
            temperature: 0.1,
            system_message: true,
        }
    }

    pub fn llm(chat: ChatClient, temperature: f32) -> Self {
        Self {
            chat,
            name: "llm",
            temperature,
            system_message: false,
        }
    }

    fn messages(&self, question: &Question) -> (Option<&'static str>, String) {
        let query = research_query(question);
        if self.system_message {
            (Some(RESEARCH_SYSTEM_PROMPT), query)
        } else {
            (None, format!("{}\n\n{}", RESEARCH_SYSTEM_PROMPT, query))
        }
    }
}

#[async_trait]
impl ResearchProvider for ChatResearch {
    fn name(&self) -> &str {
        self.name
    }

    async fn conduct_research(&self, question: &Question) -> ForecastResult<ResearchReport> {
        tracing::info!(
            provider = self.name,
            model = %self.chat.model(),
            post_id = question.post_id,
            "Running research"
        );
        let (system, prompt) = self.messages(question);
        let text = self
            .chat
            .chat(system, &prompt, self.temperature)
            .await
            .map_err(BotError::into_research)?;
        Ok(ResearchReport::new(self.name, text))
    }
}
