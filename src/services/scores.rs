use serde::Serialize;

use crate::db::models::Score;
use crate::db::{LearningStore, StoreResult};

/// Minimum eligibility percentage, inclusive.
pub const ELIGIBILITY_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub total_score: u64,
    pub total_possible_score: u64,
    pub eligibility_percentage: f64,
    pub is_eligible: bool,
}

impl ScoreSummary {
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = Score>,
    {
        let (total_score, total_possible_score) = scores
            .into_iter()
            .fold((0u64, 0u64), |(earned, possible), score| {
                (earned + u64::from(score.points()), possible + 1)
            });

        let eligibility_percentage = if total_possible_score > 0 {
            (total_score as f64 / total_possible_score as f64) * 100.0
        } else {
            0.0
        };

        Self {
            total_score,
            total_possible_score,
            eligibility_percentage,
            is_eligible: eligibility_percentage >= ELIGIBILITY_THRESHOLD,
        }
    }
}

/// Sums every submission the learner made across all content items. A learner
/// with no submissions (or one that does not exist) gets an all-zero summary.
pub async fn aggregate_scores(
    store: &dyn LearningStore,
    learner_id: &str,
) -> StoreResult<ScoreSummary> {
    let submissions = store.submissions_for_learner(learner_id).await?;
    let summary = ScoreSummary::from_scores(submissions.iter().map(|s| s.score));

    tracing::debug!(
        learner_id = %learner_id,
        total_score = summary.total_score,
        total_possible = summary.total_possible_score,
        is_eligible = summary.is_eligible,
        "scores aggregated"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scores(points: &[u8]) -> Vec<Score> {
        points
            .iter()
            .map(|p| Score::try_from(i64::from(*p)).unwrap())
            .collect()
    }

    #[test]
    fn test_mixed_scores() {
        let summary = ScoreSummary::from_scores(scores(&[1, 0, 1, 1]));
        assert_eq!(summary.total_score, 3);
        assert_eq!(summary.total_possible_score, 4);
        assert_eq!(summary.eligibility_percentage, 75.0);
        assert!(summary.is_eligible);
    }

    #[test]
    fn test_all_wrong() {
        let summary = ScoreSummary::from_scores(scores(&[0, 0, 0]));
        assert_eq!(summary.total_score, 0);
        assert_eq!(summary.total_possible_score, 3);
        assert_eq!(summary.eligibility_percentage, 0.0);
        assert!(!summary.is_eligible);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let summary = ScoreSummary::from_scores(scores(&[1, 0, 1, 0, 0]));
        assert_eq!(summary.eligibility_percentage, 40.0);
        assert!(summary.is_eligible);
    }

    #[test]
    fn test_no_submissions() {
        let summary = ScoreSummary::from_scores(Vec::new());
        assert_eq!(
            summary,
            ScoreSummary {
                total_score: 0,
                total_possible_score: 0,
                eligibility_percentage: 0.0,
                is_eligible: false,
            }
        );
    }

    proptest! {
        #[test]
        fn prop_percentage_matches_ratio(points in proptest::collection::vec(0u8..=1, 0..200)) {
            let summary = ScoreSummary::from_scores(scores(&points));
            let earned: u64 = points.iter().map(|p| u64::from(*p)).sum();

            prop_assert_eq!(summary.total_score, earned);
            prop_assert_eq!(summary.total_possible_score, points.len() as u64);
            if points.is_empty() {
                prop_assert_eq!(summary.eligibility_percentage, 0.0);
                prop_assert!(!summary.is_eligible);
            } else {
                let expected = 100.0 * earned as f64 / points.len() as f64;
                prop_assert!((summary.eligibility_percentage - expected).abs() < 1e-9);
                prop_assert_eq!(summary.is_eligible, summary.eligibility_percentage >= 40.0);
            }
            prop_assert!(summary.eligibility_percentage >= 0.0);
            prop_assert!(summary.eligibility_percentage <= 100.0);
        }
    }
}
