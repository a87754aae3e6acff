//! Level assessments and their lifecycle.
//!
//! ```text
//! pending ──submit──▶ completed ──finalize──▶ passed | failed
//!    ▲
//!    └──reinstate── suspended ◀──suspend── (any other status)
//! ```
//!
//! Scores may be resubmitted while an assessment is `pending` or
//! `completed`. `passed` and `failed` close the cycle; only a suspension can
//! still be applied to a closed assessment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result, criteria::LevelAssessmentCriterion, gate,
  scoring::AssessmentOutcome, settings::ProgressionSettings,
};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssessmentStatus {
  Pending,
  Completed,
  Suspended,
  Passed,
  Failed,
}

impl AssessmentStatus {
  /// `passed` and `failed` end an assessment cycle.
  pub fn is_closed(self) -> bool { matches!(self, Self::Passed | Self::Failed) }
}

// ─── Scores ──────────────────────────────────────────────────────────────────

/// Instructor-submitted scores keyed by criterion. A criterion with no entry
/// scores zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaScores(BTreeMap<Uuid, u8>);

impl CriteriaScores {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, criterion_id: Uuid, score: u8) -> &mut Self {
    self.0.insert(criterion_id, score);
    self
  }

  /// The submitted score, or `0` if the criterion was skipped.
  pub fn score_for(&self, criterion_id: Uuid) -> u8 {
    self.0.get(&criterion_id).copied().unwrap_or(0)
  }

  pub fn iter(&self) -> impl Iterator<Item = (Uuid, u8)> + '_ {
    self.0.iter().map(|(id, s)| (*id, *s))
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Every key must name one of `criteria` and stay within its `max_score`.
  pub fn validate(&self, criteria: &[LevelAssessmentCriterion]) -> Result<()> {
    for (criterion_id, score) in self.iter() {
      let criterion = criteria
        .iter()
        .find(|c| c.criterion_id == criterion_id)
        .ok_or(Error::UnknownCriterion(criterion_id))?;
      if score > criterion.max_score {
        return Err(Error::ScoreOutOfRange {
          criterion_id,
          score,
          max: criterion.max_score,
        });
      }
    }
    Ok(())
  }
}

impl FromIterator<(Uuid, u8)> for CriteriaScores {
  fn from_iter<I: IntoIterator<Item = (Uuid, u8)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

// ─── Assessment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLevelAssessment {
  pub assessment_id:           Uuid,
  pub student_id:              Uuid,
  pub level_id:                Uuid,
  pub instructor_id:           Option<Uuid>,
  pub status:                  AssessmentStatus,
  pub criteria_scores:         CriteriaScores,
  /// Weighted percentage, set once scores are submitted.
  pub overall_score:           Option<f64>,
  pub passed:                  bool,
  /// Cached gatekeeper answer, refreshed on every transition.
  pub can_continue_next_level: bool,
  pub progression_suspended:   bool,
  pub suspension_reason:       Option<String>,
  /// The status the assessment held when it was suspended.
  pub suspended_from:          Option<AssessmentStatus>,
  pub assessed_at:             Option<DateTime<Utc>>,
  /// Optimistic-lock counter; `0` means the row has never been stored.
  pub version:                 u32,
  pub created_at:              DateTime<Utc>,
  pub updated_at:              DateTime<Utc>,
}

impl StudentLevelAssessment {
  /// Open a new, unsaved assessment cycle in `pending`.
  pub fn open(
    student_id: Uuid,
    level_id: Uuid,
    instructor_id: Option<Uuid>,
    settings: &ProgressionSettings,
    now: DateTime<Utc>,
  ) -> Self {
    let mut a = Self {
      assessment_id: Uuid::new_v4(),
      student_id,
      level_id,
      instructor_id,
      status: AssessmentStatus::Pending,
      criteria_scores: CriteriaScores::new(),
      overall_score: None,
      passed: false,
      can_continue_next_level: false,
      progression_suspended: false,
      suspension_reason: None,
      suspended_from: None,
      assessed_at: None,
      version: 0,
      created_at: now,
      updated_at: now,
    };
    a.refresh_gate(settings);
    a
  }

  /// Store scored results and move to `completed`.
  pub fn record_scores(
    &mut self,
    scores: CriteriaScores,
    outcome: &AssessmentOutcome,
    instructor_id: Uuid,
    settings: &ProgressionSettings,
    now: DateTime<Utc>,
  ) -> Result<()> {
    if !matches!(self.status, AssessmentStatus::Pending | AssessmentStatus::Completed) {
      return Err(Error::InvalidTransition { from: self.status, action: "score" });
    }
    self.criteria_scores = scores;
    self.overall_score = Some(outcome.overall_score);
    self.passed = outcome.passed;
    self.instructor_id = Some(instructor_id);
    self.status = AssessmentStatus::Completed;
    self.assessed_at = Some(now);
    self.touch(settings, now);
    Ok(())
  }

  /// Close a `completed` assessment as `passed` or `failed`.
  pub fn finalize(&mut self, settings: &ProgressionSettings, now: DateTime<Utc>) -> Result<()> {
    if self.status != AssessmentStatus::Completed {
      return Err(Error::InvalidTransition { from: self.status, action: "finalize" });
    }
    self.status = if self.passed {
      AssessmentStatus::Passed
    } else {
      AssessmentStatus::Failed
    };
    self.touch(settings, now);
    Ok(())
  }

  /// Block progression regardless of score.
  pub fn suspend(
    &mut self,
    reason: Option<String>,
    settings: &ProgressionSettings,
    now: DateTime<Utc>,
  ) -> Result<()> {
    if self.status == AssessmentStatus::Suspended {
      return Err(Error::InvalidTransition { from: self.status, action: "suspend" });
    }
    self.suspended_from = Some(self.status);
    self.status = AssessmentStatus::Suspended;
    self.progression_suspended = true;
    self.suspension_reason = reason;
    self.touch(settings, now);
    Ok(())
  }

  /// Lift a suspension. The student returns to `pending` and must be
  /// assessed again. Submitted criterion scores are kept for reference; the
  /// overall score and the pass are cleared.
  pub fn reinstate(&mut self, settings: &ProgressionSettings, now: DateTime<Utc>) -> Result<()> {
    if self.status != AssessmentStatus::Suspended {
      return Err(Error::InvalidTransition { from: self.status, action: "reinstate" });
    }
    self.status = AssessmentStatus::Pending;
    self.progression_suspended = false;
    self.suspension_reason = None;
    self.suspended_from = None;
    self.passed = false;
    self.overall_score = None;
    self.assessed_at = None;
    self.touch(settings, now);
    Ok(())
  }

  /// Recompute `can_continue_next_level` from the current state.
  pub fn refresh_gate(&mut self, settings: &ProgressionSettings) {
    self.can_continue_next_level = gate::can_advance(self, settings);
  }

  fn touch(&mut self, settings: &ProgressionSettings, now: DateTime<Utc>) {
    self.updated_at = now;
    self.refresh_gate(settings);
  }
}
