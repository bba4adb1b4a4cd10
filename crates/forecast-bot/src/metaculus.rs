//! Metaculus API client
//!
//! Supplies question details, posts forecasts and comments, and lists
//! tournament questions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{
    ForecastResult, ForecastSubmitter, PostDetails, Question, QuestionRef, QuestionSource,
    QuestionType,
};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::MetaculusConfig;
use crate::error::{check_status, BotError, Result};

const OPEN_PAGE_SIZE: usize = 50;
/// Hard upper limit enforced by the API
const RESOLVED_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct PostResponse {
    id: u64,
    question: Option<ApiQuestion>,
    group_of_questions: Option<QuestionGroup>,
}

#[derive(Debug, Deserialize)]
struct QuestionGroup {
    #[serde(default)]
    questions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiQuestion {
    id: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    resolution_criteria: Option<String>,
    #[serde(default)]
    fine_print: Option<String>,
    #[serde(rename = "type")]
    question_type: QuestionType,
    #[serde(default)]
    my_forecasts: Option<MyForecasts>,
}

#[derive(Debug, Deserialize)]
struct MyForecasts {
    latest: Option<LatestForecast>,
}

#[derive(Debug, Deserialize)]
struct LatestForecast {
    #[serde(default)]
    start_time: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PostsPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

/// Metaculus API client
pub struct MetaculusClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl MetaculusClient {
    pub fn new(http: Client, config: &MetaculusConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Token {}", token)),
            None => request,
        }
    }

    fn require_token(&self) -> Result<()> {
        match self.token {
            Some(_) => Ok(()),
            None => Err(BotError::MissingCredential("METACULUS_TOKEN")),
        }
    }

    async fn fetch_post(&self, post_id: u64) -> Result<PostDetails> {
        let url = format!("{}/posts/{}/", self.base_url, post_id);
        let response = self.authorized(self.http.get(&url)).send().await?;
        let post: PostResponse = check_status(response).await?.json().await?;
        post_details(post)
    }

    async fn fetch_posts_page(&self, params: &[(&str, String)]) -> Result<PostsPage> {
        let url = format!("{}/posts/", self.base_url);
        let response = self
            .authorized(self.http.get(&url))
            .query(params)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Open binary questions in a tournament
    pub async fn list_tournament_questions(&self, tournament_id: &str) -> Result<Vec<QuestionRef>> {
        let mut refs = Vec::new();
        let mut offset = 0;
        loop {
            let params = [
                ("limit", OPEN_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
                ("order_by", "-hotness".to_string()),
                ("forecast_type", "binary".to_string()),
                ("tournaments", tournament_id.to_string()),
                ("statuses", "open".to_string()),
                ("include_description", "true".to_string()),
            ];
            let page = self.fetch_posts_page(&params).await?;
            let count = page.results.len();

            for raw in page.results {
                let post: PostResponse = serde_json::from_value(raw)?;
                if let Some(question) = post.question {
                    if question.question_type == QuestionType::Binary {
                        refs.push(QuestionRef::new(question.id, post.id));
                    }
                }
            }

            if count < OPEN_PAGE_SIZE || page.next.is_none() {
                break;
            }
            offset += OPEN_PAGE_SIZE;
        }

        tracing::info!(tournament = %tournament_id, questions = refs.len(), "Listed tournament questions");
        Ok(refs)
    }

    /// Resolved questions of a tournament as raw JSON, annulled ones removed
    pub async fn list_resolved_questions(&self, tournament_id: &str) -> Result<Vec<Value>> {
        let mut questions = Vec::new();
        let mut offset = 0;
        loop {
            let params = [
                ("limit", RESOLVED_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
                ("order_by", "-open_time".to_string()),
                ("tournaments", tournament_id.to_string()),
                ("statuses", "resolved".to_string()),
                ("include_description", "true".to_string()),
            ];
            let page = self.fetch_posts_page(&params).await?;
            if page.results.is_empty() {
                break;
            }
            for post in &page.results {
                questions.extend(questions_of_post(post));
            }
            tracing::debug!(offset, collected = questions.len(), "Fetched resolved page");
            if page.next.is_none() {
                break;
            }
            offset += RESOLVED_PAGE_SIZE;
        }

        let before = questions.len();
        let questions: Vec<Value> = questions.into_iter().filter(|q| !is_annulled(q)).collect();
        tracing::info!(
            tournament = %tournament_id,
            before,
            after = questions.len(),
            "Filtered annulled questions"
        );
        Ok(questions)
    }

    async fn post_forecast(&self, question_id: u64, probability: f64) -> Result<()> {
        self.require_token()?;
        let url = format!("{}/questions/forecast/", self.base_url);
        let response = self
            .authorized(self.http.post(&url))
            .json(&forecast_payload(question_id, probability))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn create_comment(&self, post_id: u64, comment: &str) -> Result<()> {
        self.require_token()?;
        let url = format!("{}/comments/create/", self.base_url);
        let response = self
            .authorized(self.http.post(&url))
            .json(&comment_payload(post_id, comment))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl QuestionSource for MetaculusClient {
    async fn get_post_details(&self, post_id: u64) -> ForecastResult<PostDetails> {
        self.fetch_post(post_id)
            .await
            .map_err(BotError::into_question_source)
    }
}

#[async_trait]
impl ForecastSubmitter for MetaculusClient {
    async fn post_binary_forecast(&self, question_id: u64, probability: f64) -> ForecastResult<()> {
        self.post_forecast(question_id, probability)
            .await
            .map_err(BotError::into_submission)
    }

    async fn post_comment(&self, post_id: u64, comment: &str) -> ForecastResult<()> {
        self.create_comment(post_id, comment)
            .await
            .map_err(BotError::into_submission)
    }
}

fn post_details(post: PostResponse) -> Result<PostDetails> {
    let question = post.question.ok_or_else(|| {
        BotError::UnexpectedResponse(format!("post {} has no single question", post.id))
    })?;

    let latest_forecast_at = question
        .my_forecasts
        .and_then(|f| f.latest)
        .map(|latest| {
            latest
                .start_time
                .as_ref()
                .and_then(parse_timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        });

    Ok(PostDetails {
        question: Question {
            id: question.id,
            post_id: post.id,
            title: question.title,
            background: question.description.unwrap_or_default(),
            resolution_criteria: question.resolution_criteria.unwrap_or_default(),
            fine_print: question.fine_print.unwrap_or_default(),
            question_type: question.question_type,
        },
        latest_forecast_at,
    })
}

/// Accepts unix seconds or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// A post holds either one question or a group of them
fn questions_of_post(post: &Value) -> Vec<Value> {
    if let Some(group) = post.get("group_of_questions").filter(|g| !g.is_null()) {
        return group
            .get("questions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
    }
    match post.get("question").filter(|q| !q.is_null()) {
        Some(question) => vec![question.clone()],
        None => {
            tracing::warn!(post_id = %post["id"], "Could not extract question from post");
            Vec::new()
        }
    }
}

fn is_annulled(question: &Value) -> bool {
    question
        .get("resolution")
        .and_then(Value::as_str)
        .map(|r| r.trim().eq_ignore_ascii_case("annulled"))
        .unwrap_or(false)
}

fn forecast_payload(question_id: u64, probability: f64) -> Value {
    json!([{
        "question": question_id,
        "source": "api",
        "probability_yes": probability,
        "probability_yes_per_category": null,
        "continuous_cdf": null,
    }])
}

fn comment_payload(post_id: u64, comment: &str) -> Value {
    json!({
        "text": comment,
        "parent": null,
        "included_forecast": true,
        "is_private": true,
        "on_post": post_id,
    })
}
