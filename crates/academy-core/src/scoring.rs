//! Weighted scoring of level assessments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  assessment::CriteriaScores, criteria::LevelAssessmentCriterion,
  settings::ProgressionSettings,
};

/// Weighted overall score in `0.0..=100.0`.
///
/// Each criterion contributes `score * weight` out of `max_score * weight`.
/// A criterion with no submitted score counts as zero. If the criteria carry
/// no weight at all the result is `0.0`.
pub fn score_assessment(scores: &CriteriaScores, criteria: &[LevelAssessmentCriterion]) -> f64 {
  let (weighted, max_weighted) = weighted_totals(scores, criteria);
  if max_weighted <= 0.0 {
    return 0.0;
  }
  (weighted / max_weighted) * 100.0
}

/// `(achieved, attainable)` weighted points.
fn weighted_totals(scores: &CriteriaScores, criteria: &[LevelAssessmentCriterion]) -> (f64, f64) {
  criteria.iter().fold((0.0, 0.0), |(w, m), c| {
    let score = f64::from(scores.score_for(c.criterion_id));
    (w + score * c.weight, m + f64::from(c.max_score) * c.weight)
  })
}

/// The scored result of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
  pub overall_score: f64,
  pub passed:        bool,
  /// Criteria whose score fell below their own `min_passing_score`.
  pub below_minimum: Vec<Uuid>,
}

/// Score a submission and decide pass/fail.
///
/// A level passes only when every criterion meets its `min_passing_score`
/// and the weighted score reaches the curriculum's
/// `passing_score_percentage`. A rubric with no attainable weighted points
/// (no criteria, all weights zero, or all maxima zero) never passes.
pub fn evaluate(
  scores: &CriteriaScores,
  criteria: &[LevelAssessmentCriterion],
  settings: &ProgressionSettings,
) -> AssessmentOutcome {
  let (_, attainable) = weighted_totals(scores, criteria);
  let overall_score = score_assessment(scores, criteria);
  let below_minimum: Vec<Uuid> = criteria
    .iter()
    .filter(|c| scores.score_for(c.criterion_id) < c.min_passing_score)
    .map(|c| c.criterion_id)
    .collect();

  let passed = attainable > 0.0
    && below_minimum.is_empty()
    && overall_score >= settings.passing_score_percentage;

  AssessmentOutcome { overall_score, passed, below_minimum }
}
