//! A single sampled prediction run

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ForecastResult;
use crate::extract::extract_probability_percentage;
use crate::limiter::RateLimiter;
use crate::models::PredictionRun;

/// A language model completion endpoint.
///
/// Transport and API failures (including the implementation's own timeout)
/// are reported as [`ForecastError::ModelCall`](crate::ForecastError::ModelCall).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> ForecastResult<String>;
}

/// Executes prediction runs against a model behind a shared rate limiter
#[derive(Clone)]
pub struct PredictionRunner {
    model: Arc<dyn ModelClient>,
    limiter: RateLimiter,
}

impl PredictionRunner {
    pub fn new(model: Arc<dyn ModelClient>, limiter: RateLimiter) -> Self {
        Self { model, limiter }
    }

    /// Sample the model once and extract its probability.
    ///
    /// The permit is held only for the model call itself and is returned on
    /// every exit path, cancellation included.
    pub async fn run(
        &self,
        index: usize,
        prompt: &str,
        temperature: f32,
    ) -> ForecastResult<PredictionRun> {
        let raw = {
            let _permit = self.limiter.acquire().await;
            self.model.complete(prompt, temperature).await?
        };

        let percentage = extract_probability_percentage(&raw)?;
        tracing::debug!(run = index + 1, percentage, "Prediction run complete");
        tracing::trace!(run = index + 1, rationale = %raw, "Prediction rationale");

        Ok(PredictionRun {
            index,
            percentage,
            rationale: raw,
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::test_support::ScriptedModel;

    #[tokio::test]
    async fn test_run_extracts_probability() {
        let model = Arc::new(ScriptedModel::always("Reasoning...\nProbability: 64%"));
        let runner = PredictionRunner::new(model.clone(), RateLimiter::new(2));

        let run = runner.run(3, "prompt", 0.3).await.unwrap();
        assert_eq!(run.index, 3);
        assert_eq!(run.percentage, 64);
        assert_eq!(model.calls(), 1);
        assert_eq!(runner.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_releases_permit() {
        let model = Arc::new(ScriptedModel::failing("HTTP 502"));
        let runner = PredictionRunner::new(model, RateLimiter::new(1));

        let err = runner.run(0, "prompt", 0.3).await.unwrap_err();
        assert!(matches!(err, ForecastError::ModelCall(_)));
        assert_eq!(runner.limiter().in_flight(), 0);

        // The single permit is free again for the next run
        tokio_test::assert_err!(runner.run(1, "prompt", 0.3).await);
    }

    #[tokio::test]
    async fn test_refusal_is_extraction_error() {
        let model = Arc::new(ScriptedModel::always("I'd rather not guess."));
        let runner = PredictionRunner::new(model, RateLimiter::default());

        let err = runner.run(0, "prompt", 0.3).await.unwrap_err();
        assert!(matches!(err, ForecastError::Extraction(_)));
    }
}
