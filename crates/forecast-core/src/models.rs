//! Data models for the forecasting pipeline
//!
//! Questions flow in from the question source, research reports and
//! prediction runs are produced per question, and every question ends as
//! exactly one [`ForecastOutcome`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

// =============================================================================
// Questions
// =============================================================================

/// Identifies a question to forecast before its details are fetched.
///
/// Metaculus questions live inside posts; the question id receives the
/// forecast while the post id receives the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionRef {
    pub question_id: u64,
    pub post_id: u64,
}

impl QuestionRef {
    pub fn new(question_id: u64, post_id: u64) -> Self {
        Self {
            question_id,
            post_id,
        }
    }
}

/// Question type as reported by the question source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Binary,
    Numeric,
    Discrete,
    MultipleChoice,
    #[serde(other)]
    Other,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Binary => "binary",
            QuestionType::Numeric => "numeric",
            QuestionType::Discrete => "discrete",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Other => "other",
        }
    }
}

/// A fetched question. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier (target of the forecast)
    pub id: u64,

    /// Platform post identifier (target of the comment)
    pub post_id: u64,

    pub title: String,

    /// Background / description text
    #[serde(default)]
    pub background: String,

    #[serde(default)]
    pub resolution_criteria: String,

    #[serde(default)]
    pub fine_print: String,

    pub question_type: QuestionType,
}

/// Question details plus what the source knows about our previous forecasts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetails {
    pub question: Question,

    /// Time of our latest forecast on this question, if any
    pub latest_forecast_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Pipeline Artifacts
// =============================================================================

/// Output of one research provider call. An empty report is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub text: String,
    pub provider: String,
}

impl ResearchReport {
    pub fn new(provider: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provider: provider.into(),
        }
    }

    /// Report used when no research is available
    pub fn empty(provider: impl Into<String>) -> Self {
        Self::new(provider, String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Result of one sampled model call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRun {
    /// 0-based position of the run within its ensemble
    pub index: usize,

    /// Extracted probability as an integer percentage in [1, 99]
    pub percentage: u8,

    /// Raw model output
    pub rationale: String,
}

/// The reduced ensemble for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedForecast {
    /// Final probability in [0.01, 0.99]
    pub probability: f64,

    /// Contributing rationales in run order
    pub rationales: Vec<String>,

    /// Number of runs that survived and were aggregated
    pub run_count: usize,

    /// Combined report posted as the forecast comment
    pub comment: String,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Terminal result of processing one question
#[derive(Debug, Clone)]
pub enum ForecastOutcome {
    /// A forecast was produced. `posted` is false when submission is disabled.
    Submitted {
        post_id: u64,
        forecast: AggregatedForecast,
        posted: bool,
    },
    Skipped {
        post_id: u64,
        reason: String,
    },
    Failed {
        post_id: u64,
        question_id: u64,
        error: ForecastError,
    },
}

impl ForecastOutcome {
    pub fn post_id(&self) -> u64 {
        match self {
            ForecastOutcome::Submitted { post_id, .. }
            | ForecastOutcome::Skipped { post_id, .. }
            | ForecastOutcome::Failed { post_id, .. } => *post_id,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ForecastOutcome::Failed { .. })
    }

    pub fn forecast(&self) -> Option<&AggregatedForecast> {
        match self {
            ForecastOutcome::Submitted { forecast, .. } => Some(forecast),
            _ => None,
        }
    }

    /// One-line human readable description
    pub fn describe(&self) -> String {
        match self {
            ForecastOutcome::Submitted {
                post_id,
                forecast,
                posted,
            } => format!(
                "post {}: forecast {:.2} from {} run(s){}",
                post_id,
                forecast.probability,
                forecast.run_count,
                if *posted { ", submitted" } else { "" }
            ),
            ForecastOutcome::Skipped { post_id, reason } => {
                format!("post {}: skipped ({})", post_id, reason)
            }
            ForecastOutcome::Failed {
                post_id,
                question_id,
                error,
            } => format!(
                "post {} (question {}): failed [{}] {}",
                post_id,
                question_id,
                error.kind(),
                error
            ),
        }
    }
}
