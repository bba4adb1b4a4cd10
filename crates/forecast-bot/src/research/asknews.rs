//! AskNews news search
//!
//! Two searches per question: the latest-news window and the longer
//! historical knowledge base. Articles are merged into one digest, newest
//! first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_core::{ForecastResult, Question, ResearchProvider, ResearchReport};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{check_status, BotError, Result};

const TOKEN_URL: &str = "https://auth.asknews.app/oauth2/token";
const SEARCH_URL: &str = "https://api.asknews.app/v1/news/search";
const LATEST_ARTICLES: usize = 6;
const HISTORICAL_ARTICLES: usize = 10;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    as_dicts: Option<Vec<Article>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Article {
    #[serde(rename = "eng_title", alias = "title")]
    title: String,
    summary: String,
    #[serde(default)]
    language: Option<String>,
    pub_date: DateTime<Utc>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    article_url: Option<String>,
}

pub struct AskNewsResearch {
    http: Client,
    client_id: String,
    secret: String,
    timeout: Duration,
}

impl AskNewsResearch {
    pub fn new(http: Client, client_id: &str, secret: &str, timeout: Duration) -> Self {
        Self {
            http,
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            timeout,
        }
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "news")])
            .timeout(self.timeout)
            .send()
            .await?;
        let token: TokenResponse = check_status(response).await?.json().await?;
        Ok(token.access_token)
    }

    async fn search(
        &self,
        token: &str,
        query: &str,
        n_articles: usize,
        strategy: &str,
    ) -> Result<Vec<Article>> {
        let n_articles = n_articles.to_string();
        let response = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[
                ("query", query),
                ("n_articles", n_articles.as_str()),
                ("return_type", "dicts"),
                ("strategy", strategy),
            ])
            .timeout(self.timeout)
            .send()
            .await?;
        let body: SearchResponse = check_status(response).await?.json().await?;
        Ok(body.as_dicts.unwrap_or_default())
    }

    async fn digest(&self, question: &Question) -> Result<String> {
        let token = self.access_token().await?;
        let query = question.title.trim();

        let (latest, historical) = futures::try_join!(
            self.search(&token, query, LATEST_ARTICLES, "latest news"),
            self.search(&token, query, HISTORICAL_ARTICLES, "news knowledge"),
        )?;

        let mut articles = latest;
        articles.extend(historical);
        Ok(format_digest(articles))
    }
}

#[async_trait]
impl ResearchProvider for AskNewsResearch {
    fn name(&self) -> &str {
        "asknews"
    }

    async fn conduct_research(&self, question: &Question) -> ForecastResult<ResearchReport> {
        tracing::info!(provider = "asknews", post_id = question.post_id, "Running research");
        let text = self.digest(question).await.map_err(BotError::into_research)?;
        Ok(ResearchReport::new(self.name(), text))
    }
}

/// Newest first; the same article from both searches appears once
fn format_digest(mut articles: Vec<Article>) -> String {
    if articles.is_empty() {
        return "No articles were found.".to_string();
    }

    articles.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then_with(|| a.title.cmp(&b.title)));
    articles.dedup_by(|a, b| a.title == b.title && a.pub_date == b.pub_date);

    let mut digest = String::from("Here are the relevant news articles:\n\n");
    for article in &articles {
        digest.push_str(&format!(
            "**{}**\n{}\nOriginal language: {}\nPublish date: {}\nSource: [{}]({})\n\n",
            article.title,
            article.summary,
            article.language.as_deref().unwrap_or("unknown"),
            article.pub_date.format("%B %d, %Y %I:%M %p"),
            article.source_id.as_deref().unwrap_or("unknown"),
            article.article_url.as_deref().unwrap_or(""),
        ));
    }
    digest.trim_end().to_string()
}
