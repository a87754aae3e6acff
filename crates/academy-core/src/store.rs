//! The `ProgressionStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `academy-store-sqlite`).
//! The engine and the HTTP layer depend on this abstraction, not on any
//! concrete backend.
//!
//! Progress and assessment rows are written compare-and-swap: a row read at
//! version `n` is written back only if the stored row is still at `n`, and
//! comes back at `n + 1`. A row at version `0` is inserted. Losing the race
//! yields [`crate::Error::VersionConflict`].

use std::future::Future;

use uuid::Uuid;

use crate::{
  analytics::{AnalyticsKey, EntityType, ProgressionAnalytics},
  assessment::StudentLevelAssessment,
  criteria::{LevelAssessmentCriterion, NewCriterion},
  curriculum::{Curriculum, Lesson, Level, Module, NewLesson, NewLevel, NewModule},
  progress::StudentLessonProgress,
  settings::{NewSettings, ProgressionSettings},
  unlock::StudentModuleUnlock,
};

/// Abstraction over a progression store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`). Domain failures (missing parents,
/// version conflicts, a second open assessment) surface as
/// [`crate::Error`] converted into the backend's error type.
pub trait ProgressionStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  // ── Curriculum structure ──────────────────────────────────────────────

  fn add_curriculum(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Curriculum, Self::Error>> + Send + '_;

  /// Fails with `CurriculumNotFound` for an unknown parent.
  fn add_level(
    &self,
    input: NewLevel,
  ) -> impl Future<Output = Result<Level, Self::Error>> + Send + '_;

  /// Fails with `LevelNotFound` for an unknown parent.
  fn add_module(
    &self,
    input: NewModule,
  ) -> impl Future<Output = Result<Module, Self::Error>> + Send + '_;

  /// Fails with `ModuleNotFound` for an unknown parent.
  fn add_lesson(
    &self,
    input: NewLesson,
  ) -> impl Future<Output = Result<Lesson, Self::Error>> + Send + '_;

  fn get_curriculum(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Curriculum>, Self::Error>> + Send + '_;

  fn get_level(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Level>, Self::Error>> + Send + '_;

  fn get_module(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Module>, Self::Error>> + Send + '_;

  fn get_lesson(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Lesson>, Self::Error>> + Send + '_;

  /// All modules of a curriculum ordered by level sequence, then module
  /// sequence.
  fn curriculum_modules(
    &self,
    curriculum_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Module>, Self::Error>> + Send + '_;

  /// The lessons of a module in sequence order.
  fn module_lessons(
    &self,
    module_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Lesson>, Self::Error>> + Send + '_;

  // ── Settings ──────────────────────────────────────────────────────────

  /// Create the active settings row for a curriculum, or update it in place.
  fn configure_settings(
    &self,
    input: NewSettings,
  ) -> impl Future<Output = Result<ProgressionSettings, Self::Error>> + Send + '_;

  /// The active settings row, if any.
  fn get_settings(
    &self,
    curriculum_id: Uuid,
  ) -> impl Future<Output = Result<Option<ProgressionSettings>, Self::Error>> + Send + '_;

  /// Soft-delete: mark the active row inactive. Returns `None` if there was
  /// no active row.
  fn deactivate_settings(
    &self,
    curriculum_id: Uuid,
  ) -> impl Future<Output = Result<Option<ProgressionSettings>, Self::Error>> + Send + '_;

  // ── Criteria ──────────────────────────────────────────────────────────

  fn add_criterion(
    &self,
    input: NewCriterion,
  ) -> impl Future<Output = Result<LevelAssessmentCriterion, Self::Error>> + Send + '_;

  /// Criteria of a level in sequence order.
  fn list_criteria(
    &self,
    level_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LevelAssessmentCriterion>, Self::Error>> + Send + '_;

  // ── Lesson progress ───────────────────────────────────────────────────

  fn get_lesson_progress(
    &self,
    student_id: Uuid,
    lesson_id: Uuid,
  ) -> impl Future<Output = Result<Option<StudentLessonProgress>, Self::Error>> + Send + '_;

  /// Insert or compare-and-swap a progress row; returns the stored row.
  fn put_lesson_progress(
    &self,
    progress: StudentLessonProgress,
  ) -> impl Future<Output = Result<StudentLessonProgress, Self::Error>> + Send + '_;

  /// A student's progress rows for the lessons of one module.
  fn module_progress(
    &self,
    student_id: Uuid,
    module_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudentLessonProgress>, Self::Error>> + Send + '_;

  // ── Module unlocks ────────────────────────────────────────────────────

  fn get_module_unlock(
    &self,
    student_id: Uuid,
    module_id: Uuid,
  ) -> impl Future<Output = Result<Option<StudentModuleUnlock>, Self::Error>> + Send + '_;

  /// Upsert by `(student_id, module_id)`.
  fn put_module_unlock(
    &self,
    unlock: StudentModuleUnlock,
  ) -> impl Future<Output = Result<StudentModuleUnlock, Self::Error>> + Send + '_;

  fn list_unlocks(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudentModuleUnlock>, Self::Error>> + Send + '_;

  // ── Level assessments ─────────────────────────────────────────────────

  /// Insert a new assessment cycle. Fails with `AssessmentAlreadyOpen` if
  /// the student already has an open cycle for the level.
  fn insert_assessment(
    &self,
    assessment: StudentLevelAssessment,
  ) -> impl Future<Output = Result<StudentLevelAssessment, Self::Error>> + Send + '_;

  fn get_assessment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<StudentLevelAssessment>, Self::Error>> + Send + '_;

  /// Compare-and-swap an existing assessment; returns the stored row.
  fn update_assessment(
    &self,
    assessment: StudentLevelAssessment,
  ) -> impl Future<Output = Result<StudentLevelAssessment, Self::Error>> + Send + '_;

  /// A student's assessments, newest first, optionally for one level.
  fn list_assessments(
    &self,
    student_id: Uuid,
    level_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<StudentLevelAssessment>, Self::Error>> + Send + '_;

  // ── Analytics ─────────────────────────────────────────────────────────

  /// Progress rows attributed to an entity: a student's own rows, the rows
  /// an instructor graded, or every row under a curriculum.
  fn progress_for_entity(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudentLessonProgress>, Self::Error>> + Send + '_;

  /// Assessment rows attributed to an entity, with the same rules.
  fn assessments_for_entity(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudentLevelAssessment>, Self::Error>> + Send + '_;

  fn append_analytics(
    &self,
    row: ProgressionAnalytics,
  ) -> impl Future<Output = Result<ProgressionAnalytics, Self::Error>> + Send + '_;

  /// The newest snapshot recorded under `key`.
  fn latest_analytics(
    &self,
    key: AnalyticsKey,
  ) -> impl Future<Output = Result<Option<ProgressionAnalytics>, Self::Error>> + Send + '_;
}
