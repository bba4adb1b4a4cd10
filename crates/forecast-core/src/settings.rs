//! Runtime settings for a forecasting batch
//!
//! Built once before the batch starts and never mutated afterwards.

use serde::Deserialize;

use crate::error::{ForecastError, ForecastResult};

/// What to do when the research provider fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchFailurePolicy {
    /// Fail the question
    Fail,
    /// Continue forecasting with an empty research report
    #[serde(alias = "empty")]
    ContinueWithoutResearch,
}

/// Settings handed to [`BatchOrchestrator`](crate::BatchOrchestrator)
#[derive(Debug, Clone)]
pub struct ForecastSettings {
    /// Ensemble size N
    pub runs_per_question: usize,

    /// Sampling temperature for every prediction run. Must be non-zero so
    /// runs are independent samples.
    pub temperature: f32,

    /// Skip questions we already have a forecast on
    pub skip_previously_forecasted: bool,

    /// Hand finished forecasts to the submitter
    pub submit_predictions: bool,

    pub research_failure_policy: ResearchFailurePolicy,
}

impl ForecastSettings {
    pub const DEFAULT_RUNS_PER_QUESTION: usize = 5;
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    /// Defaults for everything except the research failure policy, which has
    /// to be chosen by the caller.
    pub fn new(research_failure_policy: ResearchFailurePolicy) -> Self {
        Self {
            runs_per_question: Self::DEFAULT_RUNS_PER_QUESTION,
            temperature: Self::DEFAULT_TEMPERATURE,
            skip_previously_forecasted: false,
            submit_predictions: false,
            research_failure_policy,
        }
    }

    pub fn with_runs_per_question(mut self, runs: usize) -> Self {
        self.runs_per_question = runs.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_skip_previously_forecasted(mut self, skip: bool) -> Self {
        self.skip_previously_forecasted = skip;
        self
    }

    pub fn with_submit_predictions(mut self, submit: bool) -> Self {
        self.submit_predictions = submit;
        self
    }

    /// Rejects a temperature that would make every run the same sample
    pub fn validate(&self) -> ForecastResult<()> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(ForecastError::InvalidSettings(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);
        assert_eq!(settings.runs_per_question, 5);
        assert!((settings.temperature - 0.3).abs() < f32::EPSILON);
        assert!(!settings.skip_previously_forecasted);
        assert!(!settings.submit_predictions);
    }

    #[test]
    fn test_runs_never_zero() {
        let settings =
            ForecastSettings::new(ResearchFailurePolicy::Fail).with_runs_per_question(0);
        assert_eq!(settings.runs_per_question, 1);
    }

    #[test]
    fn test_non_positive_temperature_rejected() {
        let base = ForecastSettings::new(ResearchFailurePolicy::Fail);
        assert!(base.clone().validate().is_ok());

        for temperature in [0.0, -0.5, f32::NAN] {
            let err = base.clone().with_temperature(temperature).validate().unwrap_err();
            assert_eq!(err.kind(), "invalid_settings");
        }
    }

    #[test]
    fn test_policy_names() {
        let fail: ResearchFailurePolicy = serde_json::from_str("\"fail\"").unwrap();
        assert_eq!(fail, ResearchFailurePolicy::Fail);

        let empty: ResearchFailurePolicy = serde_json::from_str("\"empty\"").unwrap();
        assert_eq!(empty, ResearchFailurePolicy::ContinueWithoutResearch);
    }
}
