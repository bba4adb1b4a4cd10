//! Research provider capability
//!
//! One provider is chosen per deployment and called once per question. The
//! report it returns is shared read-only by every prediction run.

use async_trait::async_trait;

use crate::error::ForecastResult;
use crate::models::{Question, ResearchReport};

/// Produces a research report for a question.
///
/// Implementations fail with
/// [`ForecastError::ResearchUnavailable`](crate::ForecastError::ResearchUnavailable)
/// and never turn a failure into report text; whether an empty report is an
/// acceptable fallback is decided by the caller.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    /// Short provider name recorded on every report
    fn name(&self) -> &str;

    async fn conduct_research(&self, question: &Question) -> ForecastResult<ResearchReport>;
}

/// Provider used when no research backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResearch;

#[async_trait]
impl ResearchProvider for NullResearch {
    fn name(&self) -> &str {
        "none"
    }

    async fn conduct_research(&self, _question: &Question) -> ForecastResult<ResearchReport> {
        Ok(ResearchReport::empty(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::binary_question;

    #[tokio::test]
    async fn test_null_research_is_empty() {
        let report = NullResearch
            .conduct_research(&binary_question(1))
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(report.provider, "none");
    }
}
