//! Scripted fakes for the pipeline's collaborators

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{ForecastError, ForecastResult};
use crate::models::{PostDetails, Question, QuestionType, ResearchReport};
use crate::research::ResearchProvider;
use crate::runner::ModelClient;
use crate::source::{ForecastSubmitter, QuestionSource};

pub fn binary_question(id: u64) -> Question {
    Question {
        id,
        post_id: id,
        title: format!("Will event {} happen before 2026?", id),
        background: format!("Background for event {}.", id),
        resolution_criteria: "Resolves Yes if credible reporting confirms the event.".into(),
        fine_print: "Announcements alone do not count.".into(),
        question_type: QuestionType::Binary,
    }
}

// =============================================================================
// Question Source
// =============================================================================

#[derive(Default)]
pub struct FakeSource {
    questions: HashMap<u64, Question>,
    forecasted: HashSet<u64>,
    panics: HashSet<u64>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn with_questions(post_ids: &[u64]) -> Self {
        Self {
            questions: post_ids.iter().map(|&id| (id, binary_question(id))).collect(),
            ..Self::default()
        }
    }

    pub fn already_forecasted(mut self, post_ids: &[u64]) -> Self {
        self.forecasted.extend(post_ids);
        self
    }

    pub fn numeric(mut self, post_ids: &[u64]) -> Self {
        for id in post_ids {
            if let Some(q) = self.questions.get_mut(id) {
                q.question_type = QuestionType::Numeric;
            }
        }
        self
    }

    pub fn panicking(mut self, post_ids: &[u64]) -> Self {
        self.panics.extend(post_ids);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionSource for FakeSource {
    async fn get_post_details(&self, post_id: u64) -> ForecastResult<PostDetails> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.panics.contains(&post_id) {
            panic!("source exploded on post {}", post_id);
        }
        let question = self
            .questions
            .get(&post_id)
            .cloned()
            .ok_or_else(|| ForecastError::QuestionSource(format!("post {} not found", post_id)))?;
        Ok(PostDetails {
            question,
            latest_forecast_at: self.forecasted.contains(&post_id).then(Utc::now),
        })
    }
}

// =============================================================================
// Research
// =============================================================================

pub struct ScriptedResearch {
    text: String,
    fail_all: Option<String>,
    fail_for: HashSet<u64>,
    calls: AtomicUsize,
}

impl ScriptedResearch {
    pub fn ok(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail_all: None,
            fail_for: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_all: Some(message.to_string()),
            ..Self::ok("")
        }
    }

    pub fn failing_for(text: &str, post_ids: &[u64]) -> Self {
        Self {
            fail_for: post_ids.iter().copied().collect(),
            ..Self::ok(text)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResearchProvider for ScriptedResearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn conduct_research(&self, question: &Question) -> ForecastResult<ResearchReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_all {
            return Err(ForecastError::ResearchUnavailable(message.clone()));
        }
        if self.fail_for.contains(&question.post_id) {
            return Err(ForecastError::ResearchUnavailable(format!(
                "no results for post {}",
                question.post_id
            )));
        }
        Ok(ResearchReport::new(self.name(), self.text.clone()))
    }
}

// =============================================================================
// Model
// =============================================================================

pub struct ScriptedModel {
    responses: Vec<ForecastResult<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Responses are handed out in call order, cycling when exhausted
    pub fn sequence(responses: Vec<ForecastResult<String>>) -> Self {
        Self {
            responses,
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::sequence(vec![Ok(text.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::sequence(vec![Err(ForecastError::ModelCall(message.to_string()))])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, prompt: &str, _temperature: f32) -> ForecastResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.responses[call % self.responses.len()].clone()
    }
}

// =============================================================================
// Submitter
// =============================================================================

#[derive(Default)]
pub struct RecordingSubmitter {
    pub forecasts: Mutex<Vec<(u64, f64)>>,
    pub comments: Mutex<Vec<(u64, String)>>,
    fail: bool,
}

impl RecordingSubmitter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ForecastSubmitter for RecordingSubmitter {
    async fn post_binary_forecast(&self, question_id: u64, probability: f64) -> ForecastResult<()> {
        if self.fail {
            return Err(ForecastError::Submission("HTTP 403".into()));
        }
        self.forecasts.lock().unwrap().push((question_id, probability));
        Ok(())
    }

    async fn post_comment(&self, post_id: u64, comment: &str) -> ForecastResult<()> {
        self.comments.lock().unwrap().push((post_id, comment.to_string()));
        Ok(())
    }
}
