//! [`Progression`]: the progression operations over a [`ProgressionStore`].
//!
//! Each operation reads what it needs from the store, hands plain values to
//! the pure rules in [`unlock`], [`scoring`], [`gate`] and [`analytics`], and
//! writes the result back. Settings are always fetched fresh and passed
//! explicitly; nothing is cached between calls.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error,
  analytics::{self, AnalyticsOptions, EntityType, Period, ProgressionAnalytics},
  assessment::{CriteriaScores, StudentLevelAssessment},
  curriculum::{self, Level, ModulePosition},
  gate,
  progress::{GradeLesson, StudentLessonProgress},
  scoring::{self, AssessmentOutcome},
  settings::ProgressionSettings,
  store::ProgressionStore,
  unlock::{self, LessonStars, StudentModuleUnlock, UnlockMeasure},
};

/// The result of grading a lesson: the stored grade and, if the lesson's
/// module has a successor, that module's re-evaluated unlock.
#[derive(Debug, Clone, Serialize)]
pub struct GradeOutcome {
  pub progress:    StudentLessonProgress,
  pub next_unlock: Option<StudentModuleUnlock>,
}

/// The result of submitting assessment scores.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
  pub assessment: StudentLevelAssessment,
  pub outcome:    AssessmentOutcome,
}

/// Progression operations bound to a store.
pub struct Progression<'a, S> {
  store: &'a S,
}

impl<'a, S: ProgressionStore> Progression<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// The active settings for a curriculum.
  pub async fn settings(&self, curriculum_id: Uuid) -> Result<ProgressionSettings, S::Error> {
    Ok(
      self
        .store
        .get_settings(curriculum_id)
        .await?
        .ok_or(Error::SettingsNotConfigured(curriculum_id))?,
    )
  }

  // ── Unlocks ───────────────────────────────────────────────────────────

  /// Evaluate and persist whether `student_id` may enter `module_id`.
  pub async fn evaluate_unlock(
    &self,
    student_id: Uuid,
    module_id: Uuid,
  ) -> Result<StudentModuleUnlock, S::Error> {
    let module = self
      .store
      .get_module(module_id)
      .await?
      .ok_or(Error::ModuleNotFound(module_id))?;
    let modules = self.store.curriculum_modules(module.curriculum_id).await?;

    let preceding = match curriculum::position_of(&modules, module_id)
      .ok_or(Error::ModuleNotFound(module_id))?
    {
      ModulePosition::First => None,
      ModulePosition::After(prev) => Some(prev.module_id),
    };

    let measure = match preceding {
      None => UnlockMeasure::first_module(),
      Some(prev_id) => {
        let settings = self.settings(module.curriculum_id).await?;
        let lessons = self.store.module_lessons(prev_id).await?;
        let progress = self.store.module_progress(student_id, prev_id).await?;
        unlock::measure(&LessonStars::collect(&lessons, &progress), &settings)
      }
    };

    let previous = self.store.get_module_unlock(student_id, module_id).await?;
    let was_unlocked = previous.as_ref().is_some_and(|p| p.is_unlocked);
    let row = StudentModuleUnlock::apply(previous, student_id, module_id, measure, Utc::now());
    let row = self.store.put_module_unlock(row).await?;

    if row.is_unlocked && !was_unlocked {
      info!(
        %student_id,
        %module_id,
        percentage = row.unlock_percentage,
        "module unlocked"
      );
    } else {
      debug!(
        %student_id,
        %module_id,
        unlocked = row.is_unlocked,
        threshold_met = row.threshold_met,
        percentage = row.unlock_percentage,
        "module unlock evaluated"
      );
    }
    Ok(row)
  }

  // ── Lesson progress ───────────────────────────────────────────────────

  /// Register a student's attempt at a lesson, creating the progress row on
  /// first interaction.
  pub async fn record_attempt(
    &self,
    student_id: Uuid,
    lesson_id: Uuid,
    minutes_spent: u32,
  ) -> Result<StudentLessonProgress, S::Error> {
    let lesson = self
      .store
      .get_lesson(lesson_id)
      .await?
      .ok_or(Error::LessonNotFound(lesson_id))?;
    let module = self
      .store
      .get_module(lesson.module_id)
      .await?
      .ok_or(Error::ModuleNotFound(lesson.module_id))?;
    let settings = self.settings(module.curriculum_id).await?;

    let now = Utc::now();
    let mut progress = self
      .store
      .get_lesson_progress(student_id, lesson_id)
      .await?
      .unwrap_or_else(|| StudentLessonProgress::new(student_id, lesson_id, now));
    progress.begin_attempt(minutes_spent, settings.allow_lesson_retakes, now)?;

    let progress = self.store.put_lesson_progress(progress).await?;
    debug!(%student_id, %lesson_id, attempt = progress.attempt_count, "lesson attempt recorded");
    Ok(progress)
  }

  /// Record an instructor's star grade, then re-evaluate the unlock of the
  /// module that follows the lesson's module.
  pub async fn grade_lesson(&self, input: GradeLesson) -> Result<GradeOutcome, S::Error> {
    let GradeLesson { student_id, lesson_id, stars, instructor_id, expected_version } = input;

    let lesson = self
      .store
      .get_lesson(lesson_id)
      .await?
      .ok_or(Error::LessonNotFound(lesson_id))?;
    let module = self
      .store
      .get_module(lesson.module_id)
      .await?
      .ok_or(Error::ModuleNotFound(lesson.module_id))?;
    // Fail closed before writing anything if the curriculum is unconfigured.
    self.settings(module.curriculum_id).await?;

    let now = Utc::now();
    let mut progress = self
      .store
      .get_lesson_progress(student_id, lesson_id)
      .await?
      .unwrap_or_else(|| StudentLessonProgress::new(student_id, lesson_id, now));

    if let Some(expected) = expected_version
      && expected != progress.version
    {
      return Err(Error::VersionConflict { id: progress.progress_id, expected }.into());
    }

    progress.grade(stars, lesson.max_stars, instructor_id, now)?;
    let progress = self.store.put_lesson_progress(progress).await?;
    info!(%student_id, %lesson_id, %instructor_id, stars, "lesson graded");

    let modules = self.store.curriculum_modules(module.curriculum_id).await?;
    let next_unlock = match curriculum::next_module(&modules, module.module_id) {
      Some(next) => {
        let next_id = next.module_id;
        Some(self.evaluate_unlock(student_id, next_id).await?)
      }
      None => None,
    };

    Ok(GradeOutcome { progress, next_unlock })
  }

  // ── Level assessments ─────────────────────────────────────────────────

  /// Open a `pending` assessment cycle for a student on a level.
  pub async fn open_assessment(
    &self,
    student_id: Uuid,
    level_id: Uuid,
    instructor_id: Option<Uuid>,
  ) -> Result<StudentLevelAssessment, S::Error> {
    let level = self.level(level_id).await?;
    let settings = self.settings(level.curriculum_id).await?;

    let assessment =
      StudentLevelAssessment::open(student_id, level_id, instructor_id, &settings, Utc::now());
    let assessment = self.store.insert_assessment(assessment).await?;
    info!(%student_id, %level_id, assessment_id = %assessment.assessment_id, "assessment opened");
    Ok(assessment)
  }

  /// Score an assessment against its level's criteria. With `finalize` the
  /// assessment moves straight on to `passed` or `failed`.
  pub async fn submit_scores(
    &self,
    assessment_id: Uuid,
    scores: CriteriaScores,
    instructor_id: Uuid,
    finalize: bool,
  ) -> Result<Submission, S::Error> {
    let (mut assessment, settings) = self.assessment_context(assessment_id).await?;
    let criteria = self.store.list_criteria(assessment.level_id).await?;
    scores.validate(&criteria)?;

    let outcome = scoring::evaluate(&scores, &criteria, &settings);
    let now = Utc::now();
    assessment.record_scores(scores, &outcome, instructor_id, &settings, now)?;
    if finalize {
      assessment.finalize(&settings, now)?;
    }

    let assessment = self.store.update_assessment(assessment).await?;
    info!(
      %assessment_id,
      %instructor_id,
      overall_score = outcome.overall_score,
      passed = outcome.passed,
      status = %assessment.status,
      "assessment scored"
    );
    Ok(Submission { assessment, outcome })
  }

  /// Close a `completed` assessment as `passed` or `failed`.
  pub async fn finalize_assessment(
    &self,
    assessment_id: Uuid,
  ) -> Result<StudentLevelAssessment, S::Error> {
    let (mut assessment, settings) = self.assessment_context(assessment_id).await?;
    assessment.finalize(&settings, Utc::now())?;
    let assessment = self.store.update_assessment(assessment).await?;
    info!(%assessment_id, status = %assessment.status, "assessment finalized");
    Ok(assessment)
  }

  /// Instructor override: block the student's progression past the level.
  pub async fn suspend_assessment(
    &self,
    assessment_id: Uuid,
    reason: Option<String>,
  ) -> Result<StudentLevelAssessment, S::Error> {
    let (mut assessment, settings) = self.assessment_context(assessment_id).await?;
    assessment.suspend(reason, &settings, Utc::now())?;
    let assessment = self.store.update_assessment(assessment).await?;
    info!(
      %assessment_id,
      reason = assessment.suspension_reason.as_deref().unwrap_or(""),
      "progression suspended"
    );
    Ok(assessment)
  }

  /// Lift a suspension and return the assessment to `pending`.
  pub async fn reinstate_assessment(
    &self,
    assessment_id: Uuid,
  ) -> Result<StudentLevelAssessment, S::Error> {
    let (mut assessment, settings) = self.assessment_context(assessment_id).await?;
    assessment.reinstate(&settings, Utc::now())?;
    let assessment = self.store.update_assessment(assessment).await?;
    info!(%assessment_id, "progression reinstated");
    Ok(assessment)
  }

  /// Ask the gatekeeper about a stored assessment under the current settings.
  pub async fn can_advance(&self, assessment_id: Uuid) -> Result<bool, S::Error> {
    let (assessment, settings) = self.assessment_context(assessment_id).await?;
    Ok(gate::can_advance(&assessment, &settings))
  }

  // ── Analytics ─────────────────────────────────────────────────────────

  /// Summarise an entity's activity in `period`. With `persist` the snapshot
  /// is appended to the analytics history.
  pub async fn aggregate(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
    period: Period,
    persist: bool,
  ) -> Result<ProgressionAnalytics, S::Error> {
    let options = match entity_type {
      EntityType::Curriculum => self
        .store
        .get_settings(entity_id)
        .await?
        .as_ref()
        .map(AnalyticsOptions::from)
        .unwrap_or_default(),
      EntityType::Student | EntityType::Instructor => AnalyticsOptions::default(),
    };

    let progress = self.store.progress_for_entity(entity_type, entity_id).await?;
    let assessments = self.store.assessments_for_entity(entity_type, entity_id).await?;
    let metrics = analytics::aggregate(&progress, &assessments, &period, options);

    let row = ProgressionAnalytics {
      analytics_id: Uuid::new_v4(),
      entity_type,
      entity_id,
      period_type: period.period_type,
      period_start: period.start,
      period_end: period.end,
      metrics,
      generated_at: Utc::now(),
    };

    if !persist {
      return Ok(row);
    }
    let row = self.store.append_analytics(row).await?;
    info!(
      entity_type = %entity_type,
      %entity_id,
      period_type = %period.period_type,
      period_start = %period.start,
      "analytics snapshot recorded"
    );
    Ok(row)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn level(&self, level_id: Uuid) -> Result<Level, S::Error> {
    Ok(
      self
        .store
        .get_level(level_id)
        .await?
        .ok_or(Error::LevelNotFound(level_id))?,
    )
  }

  async fn assessment_context(
    &self,
    assessment_id: Uuid,
  ) -> Result<(StudentLevelAssessment, ProgressionSettings), S::Error> {
    let assessment = self
      .store
      .get_assessment(assessment_id)
      .await?
      .ok_or(Error::AssessmentNotFound(assessment_id))?;
    let level = self.level(assessment.level_id).await?;
    let settings = self.settings(level.curriculum_id).await?;
    Ok((assessment, settings))
  }
}
