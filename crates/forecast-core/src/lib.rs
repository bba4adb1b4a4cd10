//! # Forecast Core
//!
//! Ensemble forecasting for binary questions: one research lookup per
//! question, N independently sampled model judgments on a shared prompt,
//! and a median reduction to a single probability with an auditable
//! rationale.
//!
//! ```text
//! BatchOrchestrator
//!     -> QuestionForecaster (one per question, concurrent)
//!         -> ResearchProvider (once)
//!         -> PredictionRunner x N (concurrent, behind a RateLimiter)
//!         -> aggregate (median)
//! ```
//!
//! Platform access, model transport and research backends are supplied by
//! the caller through the [`QuestionSource`], [`ForecastSubmitter`],
//! [`ModelClient`] and [`ResearchProvider`] traits.

pub mod aggregate;
pub mod error;
pub mod extract;
pub mod forecaster;
pub mod limiter;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod research;
pub mod runner;
pub mod settings;
pub mod source;

#[cfg(test)]
mod test_support;

pub use aggregate::aggregate;
pub use error::*;
pub use extract::extract_probability_percentage;
pub use forecaster::{ForecastStage, QuestionForecast, QuestionForecaster};
pub use limiter::{Permit, RateLimiter};
pub use models::*;
pub use orchestrator::{BatchOrchestrator, BatchSummary};
pub use research::{NullResearch, ResearchProvider};
pub use runner::{ModelClient, PredictionRunner};
pub use settings::{ForecastSettings, ResearchFailurePolicy};
pub use source::{ForecastSubmitter, QuestionSource};
