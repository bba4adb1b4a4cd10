//! Per-question forecasting pipeline
//!
//! ```text
//! Fetching -> Researching -> Predicting -> Aggregating -> Done
//!     \-> Skipped            (already forecasted, unsupported type)
//! any stage -> Failed        (unrecovered error)
//! ```
//!
//! Research runs exactly once per question and completes before any
//! prediction run starts; the N runs then share the same prompt and run
//! concurrently.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;

use crate::aggregate::aggregate;
use crate::error::{ForecastError, ForecastResult};
use crate::models::{AggregatedForecast, Question, QuestionRef, QuestionType, ResearchReport};
use crate::prompt::binary_prompt;
use crate::research::ResearchProvider;
use crate::runner::PredictionRunner;
use crate::settings::{ForecastSettings, ResearchFailurePolicy};
use crate::source::QuestionSource;

/// Pipeline stage, used for log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastStage {
    Fetching,
    Researching,
    Predicting,
    Aggregating,
    Done,
    Skipped,
    Failed,
}

impl fmt::Display for ForecastStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForecastStage::Fetching => "fetching",
            ForecastStage::Researching => "researching",
            ForecastStage::Predicting => "predicting",
            ForecastStage::Aggregating => "aggregating",
            ForecastStage::Done => "done",
            ForecastStage::Skipped => "skipped",
            ForecastStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Successful end states of the pipeline
#[derive(Debug, Clone)]
pub enum QuestionForecast {
    Done {
        question: Question,
        forecast: AggregatedForecast,
    },
    Skipped {
        reason: String,
    },
}

/// Runs the pipeline for one question at a time; cheap to share across tasks
#[derive(Clone)]
pub struct QuestionForecaster {
    source: Arc<dyn QuestionSource>,
    research: Arc<dyn ResearchProvider>,
    runner: PredictionRunner,
    settings: Arc<ForecastSettings>,
}

impl QuestionForecaster {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        research: Arc<dyn ResearchProvider>,
        runner: PredictionRunner,
        settings: Arc<ForecastSettings>,
    ) -> Self {
        Self {
            source,
            research,
            runner,
            settings,
        }
    }

    /// Forecast a single question
    pub async fn forecast(&self, target: QuestionRef) -> ForecastResult<QuestionForecast> {
        let post_id = target.post_id;

        tracing::debug!(post_id, stage = %ForecastStage::Fetching, "Fetching question");
        let details = self.source.get_post_details(post_id).await?;

        // Must happen before any paid call
        if self.settings.skip_previously_forecasted
            && self.source.forecast_already_made(&details)
        {
            return Ok(self.skip(post_id, "already forecasted"));
        }
        let question = details.question;
        if question.question_type != QuestionType::Binary {
            let reason = format!(
                "unsupported question type: {}",
                question.question_type.as_str()
            );
            return Ok(self.skip(post_id, &reason));
        }

        tracing::info!(
            post_id,
            question_id = question.id,
            title = %question.title,
            stage = %ForecastStage::Researching,
            "Forecasting question"
        );
        let research = self.research(&question).await?;

        let prompt = binary_prompt(&question, &research, Utc::now().date_naive());
        let runs = self.settings.runs_per_question;

        tracing::info!(post_id, runs, stage = %ForecastStage::Predicting, "Sampling ensemble");
        let results = join_all(
            (0..runs).map(|index| self.runner.run(index, &prompt, self.settings.temperature)),
        )
        .await;

        let mut survivors = Vec::with_capacity(runs);
        let mut last_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(run) => survivors.push(run),
                Err(e) if e.is_run_local() => {
                    tracing::warn!(
                        post_id,
                        run = index + 1,
                        error_kind = e.kind(),
                        error = %e,
                        "Prediction run excluded"
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::error!(
                        post_id,
                        run = index + 1,
                        error_kind = e.kind(),
                        error = %e,
                        "Prediction run failed the question"
                    );
                    return Err(e);
                }
            }
        }

        if survivors.is_empty() {
            let cause = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no runs requested".to_string());
            return Err(ForecastError::EmptyEnsemble(format!(
                "all {} prediction runs failed, last error: {}",
                runs, cause
            )));
        }

        tracing::debug!(
            post_id,
            survivors = survivors.len(),
            stage = %ForecastStage::Aggregating,
            "Aggregating ensemble"
        );
        let forecast = aggregate(&survivors)?;

        tracing::info!(
            post_id,
            probability = forecast.probability,
            run_count = forecast.run_count,
            stage = %ForecastStage::Done,
            "Forecast ready"
        );
        Ok(QuestionForecast::Done { question, forecast })
    }

    async fn research(&self, question: &Question) -> ForecastResult<ResearchReport> {
        match self.research.conduct_research(question).await {
            Ok(report) => {
                tracing::debug!(
                    post_id = question.post_id,
                    provider = %report.provider,
                    report = %report.text,
                    "Research complete"
                );
                Ok(report)
            }
            Err(e) => match self.settings.research_failure_policy {
                ResearchFailurePolicy::Fail => Err(e),
                ResearchFailurePolicy::ContinueWithoutResearch => {
                    tracing::warn!(
                        post_id = question.post_id,
                        provider = self.research.name(),
                        error = %e,
                        "Research failed, continuing without research"
                    );
                    Ok(ResearchReport::empty(self.research.name()))
                }
            },
        }
    }

    fn skip(&self, post_id: u64, reason: &str) -> QuestionForecast {
        tracing::info!(post_id, reason, stage = %ForecastStage::Skipped, "Skipping question");
        QuestionForecast::Skipped {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimiter;
    use crate::test_support::{FakeSource, ScriptedModel, ScriptedResearch};

    fn forecaster(
        source: Arc<FakeSource>,
        research: Arc<ScriptedResearch>,
        model: Arc<ScriptedModel>,
        settings: ForecastSettings,
    ) -> QuestionForecaster {
        QuestionForecaster::new(
            source,
            research,
            PredictionRunner::new(model, RateLimiter::new(5)),
            Arc::new(settings),
        )
    }

    #[tokio::test]
    async fn test_research_once_per_question() {
        let source = Arc::new(FakeSource::with_questions(&[1]));
        let research = Arc::new(ScriptedResearch::ok("findings"));
        let model = Arc::new(ScriptedModel::always("Probability: 40%"));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);

        let result = forecaster(source, research.clone(), model.clone(), settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap();

        assert_eq!(research.calls(), 1);
        assert_eq!(model.calls(), 5);
        assert!(model.prompts().iter().all(|p| p.contains("findings")));
        match result {
            QuestionForecast::Done { forecast, .. } => {
                assert_eq!(forecast.probability, 0.4);
                assert_eq!(forecast.run_count, 5);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_failures_are_excluded() {
        let source = Arc::new(FakeSource::with_questions(&[1]));
        let research = Arc::new(ScriptedResearch::ok(""));
        let model = Arc::new(ScriptedModel::sequence(vec![
            Ok("Probability: 30%".into()),
            Err(ForecastError::ModelCall("timeout".into())),
            Ok("Probability: 50%".into()),
            Ok("no number here".into()),
            Ok("Probability: 70%".into()),
        ]));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);

        let result = forecaster(source, research, model, settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap();

        let QuestionForecast::Done { forecast, .. } = result else {
            panic!("expected Done");
        };
        assert_eq!(forecast.run_count, 3);
        assert_eq!(forecast.probability, 0.5);
    }

    #[tokio::test]
    async fn test_all_runs_failing_is_empty_ensemble() {
        let source = Arc::new(FakeSource::with_questions(&[1]));
        let research = Arc::new(ScriptedResearch::ok(""));
        let model = Arc::new(ScriptedModel::failing("HTTP 500"));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);

        let err = forecaster(source, research, model, settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::EmptyEnsemble(_)));
    }

    #[tokio::test]
    async fn test_internal_run_error_fails_question() {
        let source = Arc::new(FakeSource::with_questions(&[1]));
        let research = Arc::new(ScriptedResearch::ok(""));
        let model = Arc::new(ScriptedModel::sequence(vec![
            Ok("Probability: 30%".into()),
            Err(ForecastError::Internal("bug".into())),
        ]));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);

        let err = forecaster(source, research, model, settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap_err();
        assert_eq!(err, ForecastError::Internal("bug".into()));
    }

    #[tokio::test]
    async fn test_skip_makes_no_paid_calls() {
        let source = Arc::new(FakeSource::with_questions(&[1]).already_forecasted(&[1]));
        let research = Arc::new(ScriptedResearch::ok("findings"));
        let model = Arc::new(ScriptedModel::always("Probability: 40%"));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail)
            .with_skip_previously_forecasted(true);

        let result = forecaster(source.clone(), research.clone(), model.clone(), settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap();

        assert!(matches!(result, QuestionForecast::Skipped { .. }));
        assert_eq!(source.fetches(), 1);
        assert_eq!(research.calls(), 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_already_forecasted_without_skip_flag_is_forecast() {
        let source = Arc::new(FakeSource::with_questions(&[1]).already_forecasted(&[1]));
        let research = Arc::new(ScriptedResearch::ok(""));
        let model = Arc::new(ScriptedModel::always("Probability: 40%"));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);

        let result = forecaster(source, research, model, settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap();
        assert!(matches!(result, QuestionForecast::Done { .. }));
    }

    #[tokio::test]
    async fn test_research_failure_policies() {
        let model = Arc::new(ScriptedModel::always("Probability: 40%"));

        let failing = forecaster(
            Arc::new(FakeSource::with_questions(&[1])),
            Arc::new(ScriptedResearch::failing("rate limited")),
            model.clone(),
            ForecastSettings::new(ResearchFailurePolicy::Fail),
        );
        let err = failing.forecast(QuestionRef::new(1, 1)).await.unwrap_err();
        assert!(matches!(err, ForecastError::ResearchUnavailable(_)));
        assert_eq!(model.calls(), 0);

        let degrading = forecaster(
            Arc::new(FakeSource::with_questions(&[1])),
            Arc::new(ScriptedResearch::failing("rate limited")),
            model.clone(),
            ForecastSettings::new(ResearchFailurePolicy::ContinueWithoutResearch),
        );
        let result = degrading.forecast(QuestionRef::new(1, 1)).await.unwrap();
        assert!(matches!(result, QuestionForecast::Done { .. }));
        assert_eq!(model.calls(), 5);
    }

    #[tokio::test]
    async fn test_non_binary_question_skipped() {
        let source = Arc::new(FakeSource::with_questions(&[1]).numeric(&[1]));
        let research = Arc::new(ScriptedResearch::ok(""));
        let model = Arc::new(ScriptedModel::always("Probability: 40%"));
        let settings = ForecastSettings::new(ResearchFailurePolicy::Fail);

        let result = forecaster(source, research.clone(), model, settings)
            .forecast(QuestionRef::new(1, 1))
            .await
            .unwrap();
        let QuestionForecast::Skipped { reason } = result else {
            panic!("expected Skipped");
        };
        assert_eq!(reason, "unsupported question type: numeric");
        assert_eq!(research.calls(), 0);
    }
}
