//! Per-student, per-lesson progress and star grades.
//!
//! A progress row is created on the student's first interaction with a lesson
//! and is then mutated across attempts and regrades. Rows are never deleted.
//! Every write goes through the store as a compare-and-swap on `version`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLessonProgress {
  pub progress_id:              Uuid,
  pub student_id:               Uuid,
  pub lesson_id:                Uuid,
  /// `None` until an instructor grades the lesson.
  pub stars_earned:             Option<u8>,
  pub is_completed:             bool,
  /// Only ever increases.
  pub attempt_count:            u32,
  pub total_time_spent_minutes: u32,
  pub graded_by_instructor_id:  Option<Uuid>,
  pub graded_date:              Option<DateTime<Utc>>,
  /// Optimistic-lock counter; `0` means the row has never been stored.
  pub version:                  u32,
  pub created_at:               DateTime<Utc>,
  pub updated_at:               DateTime<Utc>,
}

impl StudentLessonProgress {
  /// A fresh, unsaved row with no attempts and no grade.
  pub fn new(student_id: Uuid, lesson_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      progress_id: Uuid::new_v4(),
      student_id,
      lesson_id,
      stars_earned: None,
      is_completed: false,
      attempt_count: 0,
      total_time_spent_minutes: 0,
      graded_by_instructor_id: None,
      graded_date: None,
      version: 0,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_graded(&self) -> bool { self.stars_earned.is_some() }

  /// Register a new attempt. A completed lesson can only be attempted again
  /// when `retakes_allowed`; doing so reopens it but keeps the last grade
  /// until the instructor regrades.
  pub fn begin_attempt(
    &mut self,
    minutes_spent: u32,
    retakes_allowed: bool,
    now: DateTime<Utc>,
  ) -> Result<()> {
    if self.is_completed {
      if !retakes_allowed {
        return Err(Error::RetakesDisabled {
          student_id: self.student_id,
          lesson_id:  self.lesson_id,
        });
      }
      self.is_completed = false;
    }
    self.attempt_count = self.attempt_count.saturating_add(1);
    self.total_time_spent_minutes = self.total_time_spent_minutes.saturating_add(minutes_spent);
    self.updated_at = now;
    Ok(())
  }

  /// Record an instructor's star grade. Grading a lesson the student never
  /// formally started counts as their first attempt.
  pub fn grade(
    &mut self,
    stars: u8,
    max_stars: u8,
    instructor_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<()> {
    if stars > max_stars {
      return Err(Error::StarsOutOfRange { stars, max: max_stars });
    }
    if self.attempt_count == 0 {
      self.attempt_count = 1;
    }
    self.stars_earned = Some(stars);
    self.is_completed = true;
    self.graded_by_instructor_id = Some(instructor_id);
    self.graded_date = Some(now);
    self.updated_at = now;
    Ok(())
  }
}

/// Input to [`crate::engine::Progression::grade_lesson`].
#[derive(Debug, Clone)]
pub struct GradeLesson {
  pub student_id:       Uuid,
  pub lesson_id:        Uuid,
  pub stars:            u8,
  pub instructor_id:    Uuid,
  /// If set, the grade only applies when the stored row is at this version.
  pub expected_version: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fresh() -> StudentLessonProgress {
    StudentLessonProgress::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
  }

  #[test]
  fn new_row_is_ungraded() {
    let p = fresh();
    assert!(!p.is_graded());
    assert_eq!(p.attempt_count, 0);
    assert_eq!(p.version, 0);
  }

  #[test]
  fn attempts_accumulate_time() {
    let mut p = fresh();
    p.begin_attempt(10, false, Utc::now()).unwrap();
    p.begin_attempt(15, false, Utc::now()).unwrap();
    assert_eq!(p.attempt_count, 2);
    assert_eq!(p.total_time_spent_minutes, 25);
  }

  #[test]
  fn grading_completes_and_counts_an_attempt() {
    let mut p = fresh();
    let instructor = Uuid::new_v4();
    p.grade(2, 3, instructor, Utc::now()).unwrap();
    assert_eq!(p.stars_earned, Some(2));
    assert!(p.is_completed);
    assert_eq!(p.attempt_count, 1);
    assert_eq!(p.graded_by_instructor_id, Some(instructor));
    assert!(p.graded_date.is_some());
  }

  #[test]
  fn stars_above_lesson_ceiling_are_rejected() {
    let mut p = fresh();
    let err = p.grade(4, 3, Uuid::new_v4(), Utc::now()).unwrap_err();
    assert!(matches!(err, Error::StarsOutOfRange { stars: 4, max: 3 }));
    assert!(!p.is_graded());
  }

  #[test]
  fn retake_of_completed_lesson_respects_policy() {
    let mut p = fresh();
    p.grade(1, 3, Uuid::new_v4(), Utc::now()).unwrap();

    let err = p.begin_attempt(5, false, Utc::now()).unwrap_err();
    assert!(matches!(err, Error::RetakesDisabled { .. }));
    assert_eq!(p.attempt_count, 1);

    p.begin_attempt(5, true, Utc::now()).unwrap();
    assert_eq!(p.attempt_count, 2);
    assert!(!p.is_completed);
    assert_eq!(p.stars_earned, Some(1));
  }
}
