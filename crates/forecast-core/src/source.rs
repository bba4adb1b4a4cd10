//! Boundary contracts with the forecasting platform

use async_trait::async_trait;

use crate::error::ForecastResult;
use crate::models::PostDetails;

/// Supplies question details
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn get_post_details(&self, post_id: u64) -> ForecastResult<PostDetails>;

    /// Whether we already hold a forecast on this question
    fn forecast_already_made(&self, details: &PostDetails) -> bool {
        details.latest_forecast_at.is_some()
    }
}

/// Receives finished forecasts
#[async_trait]
pub trait ForecastSubmitter: Send + Sync {
    /// Post a binary forecast; `probability` is in [0.01, 0.99]
    async fn post_binary_forecast(&self, question_id: u64, probability: f64)
        -> ForecastResult<()>;

    async fn post_comment(&self, post_id: u64, comment: &str) -> ForecastResult<()>;
}
