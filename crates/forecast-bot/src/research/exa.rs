//! Exa web search
//!
//! Runs a fixed set of targeted searches and keeps the highlights of each
//! result.

use std::time::Duration;

use async_trait::async_trait;
use forecast_core::{ForecastResult, Question, ResearchProvider, ResearchReport};
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{check_status, BotError, Result};

const SEARCH_URL: &str = "https://api.exa.ai/search";
const RESULTS_PER_QUERY: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default, rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(default)]
    highlights: Vec<String>,
}

pub struct ExaResearch {
    http: Client,
    api_key: String,
    timeout: Duration,
}

impl ExaResearch {
    pub fn new(http: Client, api_key: &str, timeout: Duration) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            timeout,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .post(SEARCH_URL)
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "query": query,
                "numResults": RESULTS_PER_QUERY,
                "type": "auto",
                "contents": {
                    "highlights": { "numSentences": 3, "highlightsPerUrl": 2 }
                }
            }))
            .timeout(self.timeout)
            .send()
            .await?;
        let body: SearchResponse = check_status(response).await?.json().await?;
        Ok(body.results)
    }
}

#[async_trait]
impl ResearchProvider for ExaResearch {
    fn name(&self) -> &str {
        "exa"
    }

    async fn conduct_research(&self, question: &Question) -> ForecastResult<ResearchReport> {
        tracing::info!(provider = "exa", post_id = question.post_id, "Running research");
        let queries = search_queries(question);
        let results = try_join_all(queries.iter().map(|q| self.search(q)))
            .await
            .map_err(BotError::into_research)?;

        let sections: Vec<String> = queries
            .iter()
            .zip(results)
            .map(|(query, results)| format_section(query, &results))
            .collect();
        Ok(ResearchReport::new(self.name(), sections.join("\n\n")))
    }
}

fn search_queries(question: &Question) -> Vec<String> {
    let title = question.title.trim();
    vec![
        title.to_string(),
        format!("{} latest news", title),
        format!("{} expert analysis forecast", title),
    ]
}

fn format_section(query: &str, results: &[SearchResult]) -> String {
    let mut section = format!("### Search: {}", query);
    let mut any = false;
    for result in results.iter().filter(|r| !r.highlights.is_empty()) {
        any = true;
        section.push_str(&format!(
            "\n\n**{}** ({})\n{}",
            result.title.as_deref().unwrap_or(&result.url),
            result.published_date.as_deref().unwrap_or("undated"),
            result.url,
        ));
        for highlight in &result.highlights {
            section.push_str(&format!("\n- {}", highlight.trim()));
        }
    }
    if !any {
        section.push_str("\n\nNo highlights found.");
    }
    section
}
