//! Per-curriculum progression settings.
//!
//! Settings are an explicit value handed to every decision rule; nothing in
//! this crate looks them up from ambient state. The store keeps exactly one
//! active row per curriculum and never hard-deletes one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Share of a module's possible stars a student needs to unlock the next one.
pub const DEFAULT_UNLOCK_THRESHOLD_PERCENTAGE: f64 = 70.0;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SettingsStatus {
  #[default]
  Active,
  Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionSettings {
  pub settings_id:                         Uuid,
  pub curriculum_id:                       Uuid,
  /// 0–100; compared against the preceding module's star percentage.
  pub module_unlock_threshold_percentage:  f64,
  /// Every lesson of the preceding module must carry at least one star.
  pub require_minimum_one_star_per_lesson: bool,
  /// A pending level assessment does not block starting the next level.
  pub allow_cross_level_progression:       bool,
  /// A completed lesson may be attempted again.
  pub allow_lesson_retakes:                bool,
  /// 0–100; the weighted score a level assessment must reach to pass.
  pub passing_score_percentage:            f64,
  pub track_time_spent:                    bool,
  pub track_star_distribution:             bool,
  pub status:                              SettingsStatus,
  pub created_at:                          DateTime<Utc>,
  pub updated_at:                          DateTime<Utc>,
}

impl ProgressionSettings {
  /// Build an unsaved settings value with every optional field defaulted.
  pub fn new(curriculum_id: Uuid, passing_score_percentage: f64) -> Self {
    NewSettings::new(curriculum_id, passing_score_percentage)
      .into_settings(Uuid::new_v4(), Utc::now())
  }

  pub fn is_active(&self) -> bool { self.status == SettingsStatus::Active }
}

/// Input to [`crate::store::ProgressionStore::configure_settings`].
///
/// `passing_score_percentage` has no default: a curriculum cannot be
/// configured without stating how level assessments pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSettings {
  pub curriculum_id:                       Uuid,
  pub passing_score_percentage:            f64,
  #[serde(default = "default_threshold")]
  pub module_unlock_threshold_percentage:  f64,
  #[serde(default)]
  pub require_minimum_one_star_per_lesson: bool,
  #[serde(default = "yes")]
  pub allow_cross_level_progression:       bool,
  #[serde(default = "yes")]
  pub allow_lesson_retakes:                bool,
  #[serde(default = "yes")]
  pub track_time_spent:                    bool,
  #[serde(default = "yes")]
  pub track_star_distribution:             bool,
}

fn default_threshold() -> f64 { DEFAULT_UNLOCK_THRESHOLD_PERCENTAGE }

fn yes() -> bool { true }

impl NewSettings {
  pub fn new(curriculum_id: Uuid, passing_score_percentage: f64) -> Self {
    Self {
      curriculum_id,
      passing_score_percentage,
      module_unlock_threshold_percentage: DEFAULT_UNLOCK_THRESHOLD_PERCENTAGE,
      require_minimum_one_star_per_lesson: false,
      allow_cross_level_progression: true,
      allow_lesson_retakes: true,
      track_time_spent: true,
      track_star_distribution: true,
    }
  }

  pub fn validate(&self) -> Result<()> {
    check_percentage(
      "module_unlock_threshold_percentage",
      self.module_unlock_threshold_percentage,
    )?;
    check_percentage("passing_score_percentage", self.passing_score_percentage)
  }

  /// Materialise an active settings row.
  pub fn into_settings(self, settings_id: Uuid, now: DateTime<Utc>) -> ProgressionSettings {
    ProgressionSettings {
      settings_id,
      curriculum_id: self.curriculum_id,
      module_unlock_threshold_percentage: self.module_unlock_threshold_percentage,
      require_minimum_one_star_per_lesson: self.require_minimum_one_star_per_lesson,
      allow_cross_level_progression: self.allow_cross_level_progression,
      allow_lesson_retakes: self.allow_lesson_retakes,
      passing_score_percentage: self.passing_score_percentage,
      track_time_spent: self.track_time_spent,
      track_star_distribution: self.track_star_distribution,
      status: SettingsStatus::Active,
      created_at: now,
      updated_at: now,
    }
  }
}

fn check_percentage(field: &str, value: f64) -> Result<()> {
  if value.is_finite() && (0.0..=100.0).contains(&value) {
    Ok(())
  } else {
    Err(Error::Validation(format!(
      "{field} must be between 0 and 100, got {value}"
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_documented_values() {
    let s = ProgressionSettings::new(Uuid::nil(), 60.0);
    assert_eq!(s.module_unlock_threshold_percentage, 70.0);
    assert_eq!(s.passing_score_percentage, 60.0);
    assert!(s.is_active());
    assert!(!s.require_minimum_one_star_per_lesson);
  }

  #[test]
  fn percentages_outside_range_are_rejected() {
    let mut input = NewSettings::new(Uuid::nil(), 60.0);
    assert!(input.validate().is_ok());

    input.module_unlock_threshold_percentage = 100.5;
    assert!(matches!(input.validate(), Err(Error::Validation(_))));

    input.module_unlock_threshold_percentage = 70.0;
    input.passing_score_percentage = f64::NAN;
    assert!(matches!(input.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn passing_score_is_required_when_deserialising() {
    let body = serde_json::json!({ "curriculum_id": Uuid::nil() });
    assert!(serde_json::from_value::<NewSettings>(body).is_err());

    let body = serde_json::json!({
      "curriculum_id": Uuid::nil(),
      "passing_score_percentage": 75.0,
    });
    let parsed: NewSettings = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.module_unlock_threshold_percentage, 70.0);
    assert!(parsed.allow_lesson_retakes);
  }

  #[test]
  fn status_round_trips_through_strings() {
    assert_eq!(SettingsStatus::Inactive.as_ref(), "inactive");
    assert_eq!("active".parse::<SettingsStatus>().unwrap(), SettingsStatus::Active);
  }
}
