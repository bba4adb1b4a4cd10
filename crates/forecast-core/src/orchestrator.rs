//! Batch orchestration
//!
//! Drives every question's pipeline concurrently and turns each into exactly
//! one [`ForecastOutcome`]. Errors and panics stay inside their question.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;

use crate::error::{BatchFailed, ForecastError, ForecastResult};
use crate::forecaster::{QuestionForecast, QuestionForecaster};
use crate::limiter::RateLimiter;
use crate::models::{AggregatedForecast, ForecastOutcome, Question, QuestionRef};
use crate::research::ResearchProvider;
use crate::runner::{ModelClient, PredictionRunner};
use crate::settings::ForecastSettings;
use crate::source::{ForecastSubmitter, QuestionSource};

/// Outcomes of a batch, in input order
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub outcomes: Vec<ForecastOutcome>,
}

impl BatchSummary {
    pub fn submitted(&self) -> usize {
        self.count(|o| matches!(o, ForecastOutcome::Submitted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ForecastOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(ForecastOutcome::is_failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// The batch-level failure signal: `Err` when any question failed
    pub fn ensure_success(&self) -> Result<(), BatchFailed> {
        let details: Vec<String> = self
            .outcomes
            .iter()
            .filter(|o| o.is_failed())
            .map(ForecastOutcome::describe)
            .collect();

        if details.is_empty() {
            Ok(())
        } else {
            Err(BatchFailed {
                failed: details.len(),
                total: self.outcomes.len(),
                details,
            })
        }
    }

    fn count(&self, predicate: impl Fn(&ForecastOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(*o)).count()
    }
}

/// Fans a batch of questions out over the forecasting pipeline
pub struct BatchOrchestrator {
    forecaster: QuestionForecaster,
    submitter: Option<Arc<dyn ForecastSubmitter>>,
    settings: Arc<ForecastSettings>,
}

impl BatchOrchestrator {
    /// `limiter` should be the one limiter guarding `model` for the whole
    /// process
    pub fn new(
        settings: ForecastSettings,
        source: Arc<dyn QuestionSource>,
        research: Arc<dyn ResearchProvider>,
        model: Arc<dyn ModelClient>,
        limiter: RateLimiter,
    ) -> Self {
        let settings = Arc::new(settings);
        let runner = PredictionRunner::new(model, limiter);
        let forecaster =
            QuestionForecaster::new(source, research, runner, Arc::clone(&settings));

        Self {
            forecaster,
            submitter: None,
            settings,
        }
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn ForecastSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Forecast every question concurrently.
    ///
    /// Always returns one outcome per input; use
    /// [`BatchSummary::ensure_success`] for the aggregate failure signal.
    /// Dropping the returned future cancels every in-flight pipeline.
    pub async fn run(&self, questions: &[QuestionRef]) -> BatchSummary {
        if self.settings.submit_predictions && self.submitter.is_none() {
            tracing::warn!("Submission enabled but no submitter configured; forecasts will not be posted");
        }
        tracing::info!(
            questions = questions.len(),
            runs_per_question = self.settings.runs_per_question,
            "Starting forecast batch"
        );

        let outcomes = join_all(questions.iter().map(|&target| self.run_one(target))).await;
        let summary = BatchSummary { outcomes };

        tracing::info!(
            submitted = summary.submitted(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Forecast batch finished"
        );
        summary
    }

    async fn run_one(&self, target: QuestionRef) -> ForecastOutcome {
        let post_id = target.post_id;
        let result = AssertUnwindSafe(self.process(target))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ForecastError::Internal(panic_message(panic))));

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(
                    post_id,
                    question_id = target.question_id,
                    error_kind = error.kind(),
                    error = %error,
                    "Question failed"
                );
                ForecastOutcome::Failed {
                    post_id,
                    question_id: target.question_id,
                    error,
                }
            }
        }
    }

    async fn process(&self, target: QuestionRef) -> ForecastResult<ForecastOutcome> {
        let post_id = target.post_id;
        match self.forecaster.forecast(target).await? {
            QuestionForecast::Skipped { reason } => Ok(ForecastOutcome::Skipped { post_id, reason }),
            QuestionForecast::Done { question, forecast } => {
                let posted = match (&self.submitter, self.settings.submit_predictions) {
                    (Some(submitter), true) => {
                        submit(submitter.as_ref(), &question, &forecast).await?;
                        true
                    }
                    _ => false,
                };
                Ok(ForecastOutcome::Submitted {
                    post_id,
                    forecast,
                    posted,
                })
            }
        }
    }
}

async fn submit(
    submitter: &dyn ForecastSubmitter,
    question: &Question,
    forecast: &AggregatedForecast,
) -> ForecastResult<()> {
    submitter
        .post_binary_forecast(question.id, forecast.probability)
        .await?;
    submitter
        .post_comment(question.post_id, &forecast.comment)
        .await?;
    tracing::info!(
        post_id = question.post_id,
        probability = forecast.probability,
        "Forecast submitted"
    );
    Ok(())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("pipeline panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("pipeline panicked: {}", msg)
    } else {
        "pipeline panicked".to_string()
    }
}
