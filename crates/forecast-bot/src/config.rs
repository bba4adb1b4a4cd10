//! Configuration for the forecasting bot
//!
//! Layered as: built-in defaults (credentials read from the usual
//! environment variables) < `config/default.*` < `config/local.*` <
//! `FORECAST__SECTION__KEY` environment overrides.

use config::{Config, ConfigBuilder, Environment, File};
use forecast_core::{ForecastSettings, QuestionRef, ResearchFailurePolicy};
use serde::Deserialize;

use crate::error::Result;

/// Binary questions used by `examples` mode as (question_id, post_id)
pub const EXAMPLE_QUESTIONS: &[(u64, u64)] = &[
    (578, 578), // Human Extinction
];

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub metaculus: MetaculusConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub research: ResearchConfig,
}

/// Which questions to work on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Examples,
    Tournament,
    Questions,
    ExportResolved,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    #[serde(default)]
    pub submit_predictions: bool,
    #[serde(default)]
    pub skip_previously_forecasted: bool,
    #[serde(default = "default_runs_per_question")]
    pub runs_per_question: usize,
    /// Max concurrent model calls across the whole batch
    #[serde(default = "default_concurrent_requests_limit")]
    pub concurrent_requests_limit: usize,
    /// (question_id, post_id) pairs for `questions` mode
    #[serde(default)]
    pub question_ids: Vec<(u64, u64)>,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            submit_predictions: false,
            skip_previously_forecasted: false,
            runs_per_question: default_runs_per_question(),
            concurrent_requests_limit: default_concurrent_requests_limit(),
            question_ids: Vec::new(),
            export_dir: default_export_dir(),
        }
    }
}

fn default_mode() -> RunMode {
    RunMode::Examples
}

fn default_runs_per_question() -> usize {
    ForecastSettings::DEFAULT_RUNS_PER_QUESTION
}

fn default_concurrent_requests_limit() -> usize {
    5
}

fn default_export_dir() -> String {
    "data".to_string()
}

/// Metaculus API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetaculusConfig {
    #[serde(default = "default_metaculus_url")]
    pub api_base_url: String,
    #[serde(default = "default_metaculus_token")]
    pub token: Option<String>,
    /// Numeric id or slug
    #[serde(default = "default_tournament_id")]
    pub tournament_id: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for MetaculusConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_metaculus_url(),
            token: default_metaculus_token(),
            tournament_id: default_tournament_id(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_metaculus_url() -> String {
    "https://www.metaculus.com/api".to_string()
}

fn default_metaculus_token() -> Option<String> {
    env_var("METACULUS_TOKEN")
}

fn default_tournament_id() -> String {
    "fall-aib-2025".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// OpenAI-compatible completion endpoint used for predictions
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_api_key")]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    /// HTTP-level retries for rate limits and 5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_llm_base_url() -> String {
    env_var("OPENROUTER_BASE_URL").unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string())
}

fn default_llm_api_key() -> Option<String> {
    env_var("OPENROUTER_API_KEY")
}

fn default_llm_model() -> String {
    "anthropic/claude-sonnet-4.5".to_string()
}

fn default_temperature() -> f32 {
    ForecastSettings::DEFAULT_TEMPERATURE
}

fn default_llm_timeout() -> u64 {
    180
}

fn default_max_retries() -> u32 {
    5
}

/// Research provider choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchChoice {
    /// First provider with credentials: AskNews, Exa, Perplexity, none
    Auto,
    Asknews,
    Exa,
    Perplexity,
    Llm,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_research_choice")]
    pub provider: ResearchChoice,
    /// Deliberately has no default
    pub on_failure: ResearchFailurePolicy,
    #[serde(default = "default_asknews_client_id")]
    pub asknews_client_id: Option<String>,
    #[serde(default = "default_asknews_secret")]
    pub asknews_secret: Option<String>,
    #[serde(default = "default_exa_api_key")]
    pub exa_api_key: Option<String>,
    #[serde(default = "default_perplexity_api_key")]
    pub perplexity_api_key: Option<String>,
    #[serde(default = "default_perplexity_model")]
    pub perplexity_model: String,
    /// Model for the `llm` provider
    #[serde(default = "default_research_model")]
    pub model: String,
    #[serde(default = "default_research_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

fn default_research_choice() -> ResearchChoice {
    ResearchChoice::Auto
}

fn default_asknews_client_id() -> Option<String> {
    env_var("ASKNEWS_CLIENT_ID")
}

fn default_asknews_secret() -> Option<String> {
    env_var("ASKNEWS_SECRET")
}

fn default_exa_api_key() -> Option<String> {
    env_var("EXA_API_KEY")
}

fn default_perplexity_api_key() -> Option<String> {
    env_var("PERPLEXITY_API_KEY")
}

fn default_perplexity_model() -> String {
    "sonar-pro".to_string()
}

fn default_research_model() -> String {
    "o4-mini-deep-research".to_string()
}

fn default_research_temperature() -> f32 {
    0.7
}

/// Unset and blank variables both count as missing
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FORECAST")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings = builder
            .set_default("bot.mode", "examples")?
            .set_default("bot.runs_per_question", default_runs_per_question() as i64)?
            .set_default(
                "bot.concurrent_requests_limit",
                default_concurrent_requests_limit() as i64,
            )?
            .set_default("research.provider", "auto")?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config
            .forecast_settings()
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("llm.temperature: {}", e)))?;
        Ok(config)
    }

    /// The immutable settings handed to the orchestrator
    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings::new(self.research.on_failure)
            .with_runs_per_question(self.bot.runs_per_question)
            .with_temperature(self.llm.temperature)
            .with_skip_previously_forecasted(self.bot.skip_previously_forecasted)
            .with_submit_predictions(self.bot.submit_predictions)
    }

    /// Questions for `examples` and `questions` modes
    pub fn fixed_questions(&self) -> Vec<QuestionRef> {
        let pairs: &[(u64, u64)] = match self.bot.mode {
            RunMode::Questions => &self.bot.question_ids,
            _ => EXAMPLE_QUESTIONS,
        };
        pairs
            .iter()
            .map(|&(question_id, post_id)| QuestionRef::new(question_id, post_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<AppConfig> {
        AppConfig::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults_with_explicit_policy() {
        let config = from_toml("[research]\non_failure = \"fail\"\n").unwrap();

        assert_eq!(config.bot.mode, RunMode::Examples);
        assert_eq!(config.bot.runs_per_question, 5);
        assert_eq!(config.bot.concurrent_requests_limit, 5);
        assert!(!config.bot.submit_predictions);
        assert_eq!(config.research.provider, ResearchChoice::Auto);
        assert_eq!(config.research.on_failure, ResearchFailurePolicy::Fail);
        assert_eq!(config.metaculus.tournament_id, "fall-aib-2025");
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_research_policy_is_rejected() {
        tokio_test::assert_err!(from_toml("[bot]\nmode = \"tournament\"\n"));
    }

    #[test]
    fn test_questions_mode() {
        let config = from_toml(
            r#"
[bot]
mode = "questions"
runs_per_question = 3
skip_previously_forecasted = true
question_ids = [[101, 201], [102, 202]]

[research]
provider = "none"
on_failure = "empty"
"#,
        )
        .unwrap();

        assert_eq!(
            config.fixed_questions(),
            vec![QuestionRef::new(101, 201), QuestionRef::new(102, 202)]
        );
        let settings = config.forecast_settings();
        assert_eq!(settings.runs_per_question, 3);
        assert!(settings.skip_previously_forecasted);
        assert_eq!(
            settings.research_failure_policy,
            ResearchFailurePolicy::ContinueWithoutResearch
        );
    }

    #[test]
    fn test_zero_temperature_is_rejected() {
        let err = from_toml("[llm]\ntemperature = 0.0\n[research]\non_failure = \"fail\"\n")
            .unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
        assert!(err.to_string().contains("temperature must be positive"));
    }

    #[test]
    fn test_export_mode_name() {
        let config =
            from_toml("[bot]\nmode = \"export-resolved\"\n[research]\non_failure = \"fail\"\n")
                .unwrap();
        assert_eq!(config.bot.mode, RunMode::ExportResolved);
    }
}
