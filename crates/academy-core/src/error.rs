//! Error types for `academy-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::assessment::AssessmentStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("curriculum not found: {0}")]
  CurriculumNotFound(Uuid),

  #[error("level not found: {0}")]
  LevelNotFound(Uuid),

  #[error("module not found: {0}")]
  ModuleNotFound(Uuid),

  #[error("lesson not found: {0}")]
  LessonNotFound(Uuid),

  #[error("assessment not found: {0}")]
  AssessmentNotFound(Uuid),

  #[error("no active progression settings for curriculum {0}")]
  SettingsNotConfigured(Uuid),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("{stars} stars exceeds the lesson maximum of {max}")]
  StarsOutOfRange { stars: u8, max: u8 },

  #[error("criterion {0} does not belong to the assessed level")]
  UnknownCriterion(Uuid),

  #[error("score {score} for criterion {criterion_id} exceeds its maximum of {max}")]
  ScoreOutOfRange {
    criterion_id: Uuid,
    score:        u8,
    max:          u8,
  },

  #[error("cannot {action} an assessment in status {from}")]
  InvalidTransition {
    from:   AssessmentStatus,
    action: &'static str,
  },

  #[error("student {student_id} already has an open assessment for level {level_id}")]
  AssessmentAlreadyOpen { student_id: Uuid, level_id: Uuid },

  #[error("lesson {lesson_id} is completed and retakes are disabled")]
  RetakesDisabled { student_id: Uuid, lesson_id: Uuid },

  /// A compare-and-swap write lost against a concurrent writer.
  #[error("record {id} was modified concurrently (expected version {expected})")]
  VersionConflict { id: Uuid, expected: u32 },
}

impl Error {
  /// Whether the error names a record that does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::CurriculumNotFound(_)
        | Self::LevelNotFound(_)
        | Self::ModuleNotFound(_)
        | Self::LessonNotFound(_)
        | Self::AssessmentNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
