//! Forecasting Bot
//!
//! Runs the ensemble forecaster against Metaculus binary questions: fetch
//! each question, research it once, sample the model N times, submit the
//! median.
//!
//! # Modes
//!
//! - `examples`: a fixed set of example questions
//! - `tournament`: every open binary question in the configured tournament
//! - `questions`: the `(question_id, post_id)` pairs in `bot.question_ids`
//! - `export-resolved`: dump the tournament's resolved questions to JSON

mod config;
mod error;
mod export;
mod llm;
mod metaculus;
mod research;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use forecast_core::{BatchOrchestrator, ForecastOutcome, RateLimiter};
use reqwest::Client;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, RunMode};
use crate::llm::ChatClient;
use crate::metaculus::MetaculusClient;
use crate::research::{build_provider, ResearchProviderKind};

fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("forecast_bot=info,forecast_core=info")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting forecasting bot v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    tracing::info!(
        mode = ?config.bot.mode,
        model = %config.llm.model,
        runs_per_question = config.bot.runs_per_question,
        submit_predictions = config.bot.submit_predictions,
        tournament = %config.metaculus.tournament_id,
        "Configuration loaded"
    );

    let rt = Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    // One HTTP client for the whole batch, dropped when `run` returns
    let http = Client::builder()
        .user_agent(concat!("forecast-bot/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let metaculus = Arc::new(MetaculusClient::new(http.clone(), &config.metaculus));

    if config.bot.mode == RunMode::ExportResolved {
        let (path, written) = export::export_resolved(
            &metaculus,
            &config.metaculus.tournament_id,
            Path::new(&config.bot.export_dir),
        )
        .await?;
        tracing::info!(path = %path.display(), written, "Export finished");
        return Ok(());
    }

    let questions = match config.bot.mode {
        RunMode::Tournament => {
            metaculus
                .list_tournament_questions(&config.metaculus.tournament_id)
                .await?
        }
        _ => config.fixed_questions(),
    };
    if questions.is_empty() {
        tracing::warn!("No questions to forecast");
        return Ok(());
    }

    let model = Arc::new(ChatClient::from_config(http.clone(), &config.llm)?);
    let research_kind = ResearchProviderKind::resolve(&config.research);
    let research = build_provider(research_kind, http.clone(), &config)?;
    let limiter = RateLimiter::new(config.bot.concurrent_requests_limit);

    let orchestrator = BatchOrchestrator::new(
        config.forecast_settings(),
        metaculus.clone(),
        research,
        model,
        limiter,
    )
    .with_submitter(metaculus);

    let summary = tokio::select! {
        summary = orchestrator.run(&questions) => summary,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling in-flight forecasts");
            anyhow::bail!("forecast batch interrupted");
        }
    };

    for outcome in &summary.outcomes {
        match outcome {
            ForecastOutcome::Failed { .. } => tracing::error!("{}", outcome.describe()),
            _ => tracing::info!("{}", outcome.describe()),
        }
    }

    summary.ensure_success()?;
    Ok(())
}
