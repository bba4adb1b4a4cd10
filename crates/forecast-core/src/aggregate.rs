//! Ensemble aggregation
//!
//! Reduces the surviving prediction runs of one question to a single
//! probability using the median, which a single extreme run cannot drag
//! the way it would drag a mean.

use crate::error::{ForecastError, ForecastResult};
use crate::models::{AggregatedForecast, PredictionRun};

/// Reduce `runs` to one forecast plus the combined comment.
///
/// Runs are reported in run order regardless of the order they finished in.
pub fn aggregate(runs: &[PredictionRun]) -> ForecastResult<AggregatedForecast> {
    if runs.is_empty() {
        return Err(ForecastError::EmptyEnsemble(
            "no prediction runs to aggregate".to_string(),
        ));
    }

    let mut ordered: Vec<&PredictionRun> = runs.iter().collect();
    ordered.sort_by_key(|run| run.index);

    let percentages: Vec<u8> = ordered.iter().map(|run| run.percentage).collect();
    let median = median_percentage(&percentages).ok_or_else(|| {
        ForecastError::EmptyEnsemble("no percentages to aggregate".to_string())
    })?;
    let probability = f64::from(median) / 100.0;

    let rationales: Vec<String> = ordered.iter().map(|run| run.rationale.clone()).collect();
    let comment = format_comment(probability, &ordered);

    Ok(AggregatedForecast {
        probability,
        rationales,
        run_count: ordered.len(),
        comment,
    })
}

/// Median of integer percentages.
///
/// For an even count the two middle values are averaged and rounded half
/// up, so the result stays an integer percentage: [10, 20] -> 15,
/// [10, 11] -> 11.
pub fn median_percentage(percentages: &[u8]) -> Option<u8> {
    let mut sorted = percentages.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        Some(sorted[mid])
    } else {
        let sum = u16::from(sorted[mid - 1]) + u16::from(sorted[mid]);
        Some(((sum + 1) / 2) as u8)
    }
}

/// Comment layout expected by the submission client
fn format_comment(probability: f64, runs: &[&PredictionRun]) -> String {
    let mut sections = Vec::with_capacity(runs.len() + 1);
    sections.push(format!("Median Probability: {}", probability));
    for run in runs {
        sections.push(format!("## Rationale {}\n{}", run.index + 1, run.rationale));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(percentages: &[u8]) -> Vec<PredictionRun> {
        percentages
            .iter()
            .enumerate()
            .map(|(index, &percentage)| PredictionRun {
                index,
                percentage,
                rationale: format!("reasoning {}", index + 1),
            })
            .collect()
    }

    #[test]
    fn test_odd_median() {
        let forecast = aggregate(&runs(&[2, 5, 3, 4, 3])).unwrap();
        assert_eq!(forecast.probability, 0.03);
        assert_eq!(forecast.run_count, 5);
    }

    #[test]
    fn test_even_median_rounds_half_up() {
        assert_eq!(aggregate(&runs(&[10, 20])).unwrap().probability, 0.15);
        assert_eq!(median_percentage(&[10, 11]), Some(11));
        assert_eq!(median_percentage(&[1, 2, 98, 99]), Some(50));
        assert_eq!(median_percentage(&[]), None);
    }

    #[test]
    fn test_outlier_does_not_move_median() {
        assert_eq!(median_percentage(&[30, 32, 99, 31, 29]), Some(31));
    }

    #[test]
    fn test_empty_ensemble() {
        let err = aggregate(&[]).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyEnsemble(_)));
    }

    #[test]
    fn test_comment_layout() {
        let forecast = aggregate(&runs(&[40, 60])).unwrap();
        assert_eq!(
            forecast.comment,
            "Median Probability: 0.5\n\n## Rationale 1\nreasoning 1\n\n## Rationale 2\nreasoning 2"
        );
    }

    #[test]
    fn test_surviving_runs_keep_their_labels() {
        // Runs 2 and 4 failed; survivors arrive out of order.
        let survivors = vec![
            PredictionRun {
                index: 4,
                percentage: 70,
                rationale: "fifth".into(),
            },
            PredictionRun {
                index: 0,
                percentage: 50,
                rationale: "first".into(),
            },
            PredictionRun {
                index: 2,
                percentage: 60,
                rationale: "third".into(),
            },
        ];
        let forecast = aggregate(&survivors).unwrap();
        assert_eq!(forecast.probability, 0.6);
        assert_eq!(forecast.rationales, vec!["first", "third", "fifth"]);
        assert!(forecast.comment.contains("## Rationale 1\nfirst\n\n## Rationale 3\nthird"));
        assert!(forecast.comment.ends_with("## Rationale 5\nfifth"));
    }
}
