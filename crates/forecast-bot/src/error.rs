//! Error types for the bot's external clients

use forecast_core::ForecastError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Whether a retry could succeed (rate limits, server errors, transport)
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            BotError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn into_model_call(self) -> ForecastError {
        ForecastError::ModelCall(self.to_string())
    }

    pub fn into_research(self) -> ForecastError {
        ForecastError::ResearchUnavailable(self.to_string())
    }

    pub fn into_question_source(self) -> ForecastError {
        ForecastError::QuestionSource(self.to_string())
    }

    pub fn into_submission(self) -> ForecastError {
        ForecastError::Submission(self.to_string())
    }
}

/// Turn a non-success response into [`BotError::Api`]
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BotError::Api {
        status: status.as_u16(),
        body: truncate(&body, 500),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
