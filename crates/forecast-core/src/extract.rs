//! Probability extraction from free-text model output
//!
//! Models are asked to finish with a line like `Probability: 35%`. The last
//! such line wins, since models sometimes restate intermediate estimates
//! before the final answer.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ForecastError, ForecastResult};

/// Lowest and highest percentage we are willing to submit
pub const MIN_PERCENTAGE: u8 = 1;
pub const MAX_PERCENTAGE: u8 = 99;

// A leading sign is tolerated and dropped.
static PROBABILITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)probability\s*:\s*[-+]?\s*(\d+)\s*%")
        .expect("probability pattern is a valid regex")
});

/// Extract the final `Probability: NN%` from `text`, clamped to [1, 99].
pub fn extract_probability_percentage(text: &str) -> ForecastResult<u8> {
    let digits = PROBABILITY_PATTERN
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            ForecastError::Extraction(format!(
                "no 'Probability: NN%' found in {} chars of model output",
                text.len()
            ))
        })?;

    // Digit strings too long for u64 are far above the ceiling anyway.
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Ok(clamp_percentage(value))
}

fn clamp_percentage(value: u64) -> u8 {
    value.clamp(MIN_PERCENTAGE as u64, MAX_PERCENTAGE as u64) as u8
}
