//! Module unlock evaluation.
//!
//! Whether a student may enter a module depends only on the star grades they
//! earned in the module directly before it. The opening module of a
//! curriculum has no predecessor and is unlocked by definition.
//!
//! Unlocks are sticky: once a student has entered a module, a later regrade
//! of the preceding module never locks it again. The snapshot fields still
//! track the latest evaluation, so `threshold_met` may drop to `false` on an
//! unlocked row after such a regrade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  curriculum::Lesson, progress::StudentLessonProgress, settings::ProgressionSettings,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentModuleUnlock {
  pub unlock_id:            Uuid,
  pub student_id:           Uuid,
  pub module_id:            Uuid,
  pub is_unlocked:          bool,
  /// Set once, on the locked → unlocked transition.
  pub unlocked_date:        Option<DateTime<Utc>>,
  /// Stars earned in the preceding module at evaluation time.
  pub stars_earned:         u32,
  pub total_possible_stars: u32,
  pub unlock_percentage:    f64,
  pub threshold_met:        bool,
  pub evaluated_at:         DateTime<Utc>,
}

/// One lesson of the preceding module as the evaluator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonStars {
  pub max_stars:    u8,
  /// `None` when the lesson is ungraded or was never started.
  pub stars_earned: Option<u8>,
}

impl LessonStars {
  /// Pair every lesson with the student's progress row for it, if one exists.
  pub fn collect(lessons: &[Lesson], progress: &[StudentLessonProgress]) -> Vec<Self> {
    lessons
      .iter()
      .map(|lesson| LessonStars {
        max_stars:    lesson.max_stars,
        stars_earned: progress
          .iter()
          .find(|p| p.lesson_id == lesson.lesson_id)
          .and_then(|p| p.stars_earned),
      })
      .collect()
  }
}

/// The outcome of measuring a preceding module against the settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnlockMeasure {
  pub stars_earned:         u32,
  pub total_possible_stars: u32,
  pub unlock_percentage:    f64,
  pub threshold_met:        bool,
}

impl UnlockMeasure {
  /// The opening module: nothing to measure, always met.
  pub fn first_module() -> Self {
    Self {
      stars_earned:         0,
      total_possible_stars: 0,
      unlock_percentage:    0.0,
      threshold_met:        true,
    }
  }
}

/// Measure the preceding module's lessons against the unlock threshold.
///
/// Ungraded lessons count as zero stars. A module with no possible stars
/// measures 0% and never meets the threshold.
pub fn measure(lessons: &[LessonStars], settings: &ProgressionSettings) -> UnlockMeasure {
  let stars_earned: u32 = lessons
    .iter()
    .map(|l| u32::from(l.stars_earned.unwrap_or(0)))
    .sum();
  let total_possible_stars: u32 = lessons.iter().map(|l| u32::from(l.max_stars)).sum();

  if total_possible_stars == 0 {
    return UnlockMeasure {
      stars_earned,
      total_possible_stars,
      unlock_percentage: 0.0,
      threshold_met: false,
    };
  }

  // Multiply before dividing so whole-number percentages stay exact.
  let unlock_percentage = f64::from(stars_earned) * 100.0 / f64::from(total_possible_stars);
  let mut threshold_met = unlock_percentage >= settings.module_unlock_threshold_percentage;

  if settings.require_minimum_one_star_per_lesson {
    threshold_met &= lessons.iter().all(|l| l.stars_earned.unwrap_or(0) >= 1);
  }

  UnlockMeasure {
    stars_earned,
    total_possible_stars,
    unlock_percentage,
    threshold_met,
  }
}

impl StudentModuleUnlock {
  /// Fold a fresh measurement into the stored row (if any).
  pub fn apply(
    previous: Option<StudentModuleUnlock>,
    student_id: Uuid,
    module_id: Uuid,
    measure: UnlockMeasure,
    now: DateTime<Utc>,
  ) -> StudentModuleUnlock {
    let (unlock_id, was_unlocked, unlocked_date) = match previous {
      Some(p) => (p.unlock_id, p.is_unlocked, p.unlocked_date),
      None => (Uuid::new_v4(), false, None),
    };

    let is_unlocked = was_unlocked || measure.threshold_met;
    let unlocked_date = match (was_unlocked, is_unlocked) {
      (false, true) => Some(now),
      _ => unlocked_date,
    };

    StudentModuleUnlock {
      unlock_id,
      student_id,
      module_id,
      is_unlocked,
      unlocked_date,
      stars_earned: measure.stars_earned,
      total_possible_stars: measure.total_possible_stars,
      unlock_percentage: measure.unlock_percentage,
      threshold_met: measure.threshold_met,
      evaluated_at: now,
    }
  }
}
