//! Error types for the forecasting core

use thiserror::Error;

/// Everything that can go wrong while forecasting a question.
///
/// Variants carry plain strings so an error can be stored inside a
/// [`ForecastOutcome`](crate::ForecastOutcome) and cloned into summaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForecastError {
    #[error("Research unavailable: {0}")]
    ResearchUnavailable(String),

    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Probability extraction failed: {0}")]
    Extraction(String),

    #[error("Empty ensemble: {0}")]
    EmptyEnsemble(String),

    #[error("Question source error: {0}")]
    QuestionSource(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForecastError {
    /// Stable short code for logs and run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::ResearchUnavailable(_) => "research_unavailable",
            ForecastError::ModelCall(_) => "model_call",
            ForecastError::Extraction(_) => "extraction",
            ForecastError::EmptyEnsemble(_) => "empty_ensemble",
            ForecastError::QuestionSource(_) => "question_source",
            ForecastError::Submission(_) => "submission",
            ForecastError::InvalidSettings(_) => "invalid_settings",
            ForecastError::Internal(_) => "internal",
        }
    }

    /// Whether a failed prediction run is excluded from the ensemble instead
    /// of failing the whole question
    pub fn is_run_local(&self) -> bool {
        matches!(
            self,
            ForecastError::ModelCall(_) | ForecastError::Extraction(_)
        )
    }
}

pub type ForecastResult<T> = Result<T, ForecastError>;

/// Raised after a batch completes when at least one question failed
#[derive(Error, Debug, Clone)]
#[error("{failed} of {total} questions failed: {}", .details.join("; "))]
pub struct BatchFailed {
    pub failed: usize,
    pub total: usize,
    /// One line per failed question
    pub details: Vec<String>,
}
