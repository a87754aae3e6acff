//! Weighted assessment criteria authored per level.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const DEFAULT_WEIGHT: f64 = 1.0;
pub const DEFAULT_MAX_SCORE: u8 = 3;
pub const DEFAULT_MIN_PASSING_SCORE: u8 = 1;

/// Human-readable meaning of each score, e.g. `0 → "not demonstrated"`.
pub type ScoreDescriptors = BTreeMap<u8, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelAssessmentCriterion {
  pub criterion_id:      Uuid,
  pub level_id:          Uuid,
  pub name:              String,
  pub description:       Option<String>,
  pub sequence_order:    i32,
  pub weight:            f64,
  pub max_score:         u8,
  /// Lowest score on this criterion that still allows the level to pass.
  pub min_passing_score: u8,
  pub score_descriptors: ScoreDescriptors,
  pub created_at:        DateTime<Utc>,
}

impl LevelAssessmentCriterion {
  /// Build an unsaved criterion from validated input.
  pub fn from_new(input: NewCriterion, criterion_id: Uuid, now: DateTime<Utc>) -> Result<Self> {
    input.validate()?;
    Ok(Self {
      criterion_id,
      level_id: input.level_id,
      name: input.name,
      description: input.description,
      sequence_order: input.sequence_order,
      weight: input.weight,
      max_score: input.max_score,
      min_passing_score: input.min_passing_score,
      score_descriptors: input.score_descriptors,
      created_at: now,
    })
  }
}

/// Input to [`crate::store::ProgressionStore::add_criterion`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCriterion {
  pub level_id:          Uuid,
  pub name:              String,
  #[serde(default)]
  pub description:       Option<String>,
  pub sequence_order:    i32,
  #[serde(default = "default_weight")]
  pub weight:            f64,
  #[serde(default = "default_max_score")]
  pub max_score:         u8,
  #[serde(default = "default_min_passing_score")]
  pub min_passing_score: u8,
  #[serde(default)]
  pub score_descriptors: ScoreDescriptors,
}

fn default_weight() -> f64 { DEFAULT_WEIGHT }

fn default_max_score() -> u8 { DEFAULT_MAX_SCORE }

fn default_min_passing_score() -> u8 { DEFAULT_MIN_PASSING_SCORE }

impl NewCriterion {
  pub fn new(level_id: Uuid, name: impl Into<String>, sequence_order: i32) -> Self {
    Self {
      level_id,
      name: name.into(),
      description: None,
      sequence_order,
      weight: DEFAULT_WEIGHT,
      max_score: DEFAULT_MAX_SCORE,
      min_passing_score: DEFAULT_MIN_PASSING_SCORE,
      score_descriptors: ScoreDescriptors::new(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::Validation("criterion name must not be empty".into()));
    }
    if !self.weight.is_finite() || self.weight < 0.0 {
      return Err(Error::Validation(format!(
        "criterion weight must be a non-negative number, got {}",
        self.weight
      )));
    }
    if self.max_score == 0 {
      return Err(Error::Validation("criterion max_score must be at least 1".into()));
    }
    if self.min_passing_score > self.max_score {
      return Err(Error::Validation(format!(
        "min_passing_score {} exceeds max_score {}",
        self.min_passing_score, self.max_score
      )));
    }
    if let Some(score) = self.score_descriptors.keys().find(|&&k| k > self.max_score) {
      return Err(Error::Validation(format!(
        "score descriptor for {score} exceeds max_score {}",
        self.max_score
      )));
    }
    Ok(())
  }
}
