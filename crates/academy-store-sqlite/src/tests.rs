//! Integration tests for `SqliteStore` against an in-memory database,
//! driven through the `Progression` engine where behaviour spans tables.

use academy_core::{
  Error as CoreError,
  analytics::{EntityType, Period, PeriodType},
  assessment::{AssessmentStatus, CriteriaScores, StudentLevelAssessment},
  criteria::NewCriterion,
  curriculum::{NewLesson, NewLevel, NewModule},
  engine::Progression,
  progress::{GradeLesson, StudentLessonProgress},
  settings::{NewSettings, ProgressionSettings},
  store::ProgressionStore,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Two levels: level one holds modules A and B, level two holds module C.
/// Every module has three lessons worth three stars each.
struct Fixture {
  curriculum_id: Uuid,
  level_one:     Uuid,
  level_two:     Uuid,
  modules:       [Uuid; 3],
  lessons:       [[Uuid; 3]; 3],
}

async fn fixture(s: &SqliteStore) -> Fixture {
  let curriculum = s.add_curriculum("Keyboard".into()).await.unwrap();
  let mut level_ids = Vec::new();
  for seq in 1..=2 {
    let level = s
      .add_level(NewLevel {
        curriculum_id:  curriculum.curriculum_id,
        name:           format!("Level {seq}"),
        sequence_order: seq,
      })
      .await
      .unwrap();
    level_ids.push(level.level_id);
  }

  let mut modules = [Uuid::nil(); 3];
  let mut lessons = [[Uuid::nil(); 3]; 3];
  // Inserted out of order to exercise sequence ordering.
  for (idx, level_idx, seq) in [(2, 1, 1), (1, 0, 2), (0, 0, 1)] {
    let module = s
      .add_module(NewModule {
        level_id:       level_ids[level_idx],
        name:           format!("Module {idx}"),
        sequence_order: seq,
      })
      .await
      .unwrap();
    modules[idx] = module.module_id;
    for lesson_seq in 0..3 {
      let lesson = s
        .add_lesson(NewLesson::new(module.module_id, format!("Lesson {lesson_seq}"), lesson_seq))
        .await
        .unwrap();
      lessons[idx][lesson_seq as usize] = lesson.lesson_id;
    }
  }

  Fixture {
    curriculum_id: curriculum.curriculum_id,
    level_one: level_ids[0],
    level_two: level_ids[1],
    modules,
    lessons,
  }
}

async fn configure(s: &SqliteStore, curriculum_id: Uuid, edit: impl FnOnce(&mut NewSettings)) {
  let mut input = NewSettings::new(curriculum_id, 60.0);
  edit(&mut input);
  s.configure_settings(input).await.unwrap();
}

async fn grade(s: &SqliteStore, student: Uuid, lesson: Uuid, stars: u8) {
  Progression::new(s)
    .grade_lesson(GradeLesson {
      student_id: student,
      lesson_id: lesson,
      stars,
      instructor_id: Uuid::new_v4(),
      expected_version: None,
    })
    .await
    .unwrap();
}

fn core_error(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a core error, got {other:?}"),
  }
}

// ─── Curriculum structure ────────────────────────────────────────────────────

#[tokio::test]
async fn modules_follow_level_then_module_order() {
  let s = store().await;
  let f = fixture(&s).await;

  let ordered: Vec<Uuid> = s
    .curriculum_modules(f.curriculum_id)
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.module_id)
    .collect();
  assert_eq!(ordered, f.modules.to_vec());

  let module = s.get_module(f.modules[2]).await.unwrap().unwrap();
  assert_eq!(module.level_id, f.level_two);
  assert_eq!(module.curriculum_id, f.curriculum_id);
}

#[tokio::test]
async fn child_of_missing_parent_is_rejected() {
  let s = store().await;
  let missing = Uuid::new_v4();

  let err = s
    .add_level(NewLevel { curriculum_id: missing, name: "L".into(), sequence_order: 1 })
    .await
    .unwrap_err();
  assert!(matches!(core_error(err), CoreError::CurriculumNotFound(id) if id == missing));

  let err = s.add_lesson(NewLesson::new(missing, "x", 1)).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::ModuleNotFound(_)));
}

#[tokio::test]
async fn lesson_star_ceiling_is_validated() {
  let s = store().await;
  let f = fixture(&s).await;

  let mut input = NewLesson::new(f.modules[0], "Bonus", 9);
  input.max_stars = 4;
  let err = s.add_lesson(input).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::Validation(_)));
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn configure_updates_the_active_row_in_place() {
  let s = store().await;
  let f = fixture(&s).await;

  let first = s.configure_settings(NewSettings::new(f.curriculum_id, 60.0)).await.unwrap();
  let mut input = NewSettings::new(f.curriculum_id, 80.0);
  input.allow_lesson_retakes = false;
  let second = s.configure_settings(input).await.unwrap();

  assert_eq!(first.settings_id, second.settings_id);
  assert_eq!(second.passing_score_percentage, 80.0);
  assert!(!second.allow_lesson_retakes);
  assert_eq!(second.module_unlock_threshold_percentage, 70.0);
}

#[tokio::test]
async fn deactivated_settings_are_replaced_by_a_new_row() {
  let s = store().await;
  let f = fixture(&s).await;

  let first = s.configure_settings(NewSettings::new(f.curriculum_id, 60.0)).await.unwrap();
  let off = s.deactivate_settings(f.curriculum_id).await.unwrap().unwrap();
  assert!(!off.is_active());
  assert!(s.get_settings(f.curriculum_id).await.unwrap().is_none());
  assert!(s.deactivate_settings(f.curriculum_id).await.unwrap().is_none());

  let again = s.configure_settings(NewSettings::new(f.curriculum_id, 50.0)).await.unwrap();
  assert_ne!(again.settings_id, first.settings_id);
  assert!(again.is_active());
}

#[tokio::test]
async fn out_of_range_percentage_is_rejected() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = s
    .configure_settings(NewSettings::new(f.curriculum_id, 120.0))
    .await
    .unwrap_err();
  assert!(matches!(core_error(err), CoreError::Validation(_)));
}

// ─── Unlock evaluation ───────────────────────────────────────────────────────

#[tokio::test]
async fn first_module_is_always_unlocked() {
  let s = store().await;
  let f = fixture(&s).await;
  let student = Uuid::new_v4();

  // No settings needed for the entry module.
  let row = Progression::new(&s).evaluate_unlock(student, f.modules[0]).await.unwrap();
  assert!(row.is_unlocked);
  assert!(row.threshold_met);
  assert!(row.unlocked_date.is_some());
  assert_eq!(row.total_possible_stars, 0);
}

#[tokio::test]
async fn later_module_without_settings_fails_closed() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = Progression::new(&s)
    .evaluate_unlock(Uuid::new_v4(), f.modules[1])
    .await
    .unwrap_err();
  assert!(matches!(core_error(err), CoreError::SettingsNotConfigured(_)));
}

#[tokio::test]
async fn zero_star_lesson_blocks_when_minimum_required() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |i| {
    i.module_unlock_threshold_percentage = 60.0;
    i.require_minimum_one_star_per_lesson = true;
  })
  .await;
  let student = Uuid::new_v4();

  for (lesson, stars) in f.lessons[0].iter().zip([3, 3, 0]) {
    grade(&s, student, *lesson, stars).await;
  }

  let row = s.get_module_unlock(student, f.modules[1]).await.unwrap().unwrap();
  assert_eq!(row.stars_earned, 6);
  assert_eq!(row.total_possible_stars, 9);
  assert!(row.unlock_percentage >= 60.0);
  assert!(!row.threshold_met);
  assert!(!row.is_unlocked);
  assert!(row.unlocked_date.is_none());
}

#[tokio::test]
async fn percentage_below_threshold_blocks() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |i| i.require_minimum_one_star_per_lesson = true).await;
  let student = Uuid::new_v4();

  for lesson in f.lessons[0] {
    grade(&s, student, lesson, 2).await;
  }

  let row = s.get_module_unlock(student, f.modules[1]).await.unwrap().unwrap();
  assert_eq!(row.stars_earned, 6);
  assert!(!row.is_unlocked);
}

#[tokio::test]
async fn grading_unlocks_next_module_once() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();

  grade(&s, student, f.lessons[0][0], 3).await;
  grade(&s, student, f.lessons[0][1], 3).await;
  let locked = s.get_module_unlock(student, f.modules[1]).await.unwrap().unwrap();
  assert!(!locked.is_unlocked);

  grade(&s, student, f.lessons[0][2], 1).await;
  let unlocked = s.get_module_unlock(student, f.modules[1]).await.unwrap().unwrap();
  assert!(unlocked.is_unlocked);
  assert_eq!(unlocked.unlock_id, locked.unlock_id);
  let first_date = unlocked.unlocked_date.unwrap();

  let again = Progression::new(&s).evaluate_unlock(student, f.modules[1]).await.unwrap();
  assert_eq!(again.unlocked_date, Some(first_date));
  assert!(again.evaluated_at >= unlocked.evaluated_at);
}

#[tokio::test]
async fn unlock_survives_a_lower_regrade() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();

  for lesson in f.lessons[0] {
    grade(&s, student, lesson, 3).await;
  }
  grade(&s, student, f.lessons[0][0], 0).await;
  grade(&s, student, f.lessons[0][1], 0).await;

  let row = s.get_module_unlock(student, f.modules[1]).await.unwrap().unwrap();
  assert!(row.is_unlocked);
  assert!(!row.threshold_met);
  assert_eq!(row.stars_earned, 3);
}

#[tokio::test]
async fn unlock_crosses_level_boundary() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();

  for lesson in f.lessons[1] {
    grade(&s, student, lesson, 3).await;
  }

  let row = s.get_module_unlock(student, f.modules[2]).await.unwrap().unwrap();
  assert!(row.is_unlocked);
  assert_eq!(s.list_unlocks(student).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unlocks_are_per_student() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

  for lesson in f.lessons[0] {
    grade(&s, alice, lesson, 3).await;
  }

  let engine = Progression::new(&s);
  assert!(engine.evaluate_unlock(alice, f.modules[1]).await.unwrap().is_unlocked);
  assert!(!engine.evaluate_unlock(bob, f.modules[1]).await.unwrap().is_unlocked);
}

// ─── Lesson progress ─────────────────────────────────────────────────────────

#[tokio::test]
async fn attempts_accumulate_time() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let (student, lesson) = (Uuid::new_v4(), f.lessons[0][0]);
  let engine = Progression::new(&s);

  let first = engine.record_attempt(student, lesson, 12).await.unwrap();
  assert_eq!(first.version, 1);
  let second = engine.record_attempt(student, lesson, 8).await.unwrap();
  assert_eq!(second.progress_id, first.progress_id);
  assert_eq!(second.attempt_count, 2);
  assert_eq!(second.total_time_spent_minutes, 20);
  assert_eq!(second.version, 2);
  assert!(!second.is_completed);
}

#[tokio::test]
async fn retake_of_completed_lesson_respects_settings() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |i| i.allow_lesson_retakes = false).await;
  let (student, lesson) = (Uuid::new_v4(), f.lessons[0][0]);

  grade(&s, student, lesson, 2).await;
  let err = Progression::new(&s).record_attempt(student, lesson, 5).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::RetakesDisabled { .. }));

  let stored = s.get_lesson_progress(student, lesson).await.unwrap().unwrap();
  assert_eq!(stored.attempt_count, 1);
  assert_eq!(stored.stars_earned, Some(2));
}

#[tokio::test]
async fn stars_above_lesson_maximum_are_rejected() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;

  let err = Progression::new(&s)
    .grade_lesson(GradeLesson {
      student_id:       Uuid::new_v4(),
      lesson_id:        f.lessons[0][0],
      stars:            4,
      instructor_id:    Uuid::new_v4(),
      expected_version: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(core_error(err), CoreError::StarsOutOfRange { stars: 4, max: 3 }));
}

#[tokio::test]
async fn stale_grade_is_a_version_conflict() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let (student, lesson) = (Uuid::new_v4(), f.lessons[0][0]);
  let engine = Progression::new(&s);

  let outcome = engine
    .grade_lesson(GradeLesson {
      student_id:       student,
      lesson_id:        lesson,
      stars:            2,
      instructor_id:    Uuid::new_v4(),
      expected_version: Some(0),
    })
    .await
    .unwrap();
  assert_eq!(outcome.progress.version, 1);

  let err = engine
    .grade_lesson(GradeLesson {
      student_id:       student,
      lesson_id:        lesson,
      stars:            3,
      instructor_id:    Uuid::new_v4(),
      expected_version: Some(0),
    })
    .await
    .unwrap_err();
  assert!(matches!(core_error(err), CoreError::VersionConflict { expected: 0, .. }));
}

#[tokio::test]
async fn store_rejects_write_from_stale_read() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let (student, lesson) = (Uuid::new_v4(), f.lessons[0][0]);

  Progression::new(&s).record_attempt(student, lesson, 1).await.unwrap();
  let read_a = s.get_lesson_progress(student, lesson).await.unwrap().unwrap();
  let read_b = read_a.clone();

  s.put_lesson_progress(read_a).await.unwrap();
  let err = s.put_lesson_progress(read_b).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::VersionConflict { expected: 1, .. }));
}

// ─── Level assessments ───────────────────────────────────────────────────────

/// Two criteria on level one: technique (weight 2) and rhythm (weight 1).
async fn criteria(s: &SqliteStore, level_id: Uuid) -> (Uuid, Uuid) {
  let mut technique = NewCriterion::new(level_id, "Technique", 1);
  technique.weight = 2.0;
  technique.score_descriptors.insert(3, "Fluent".into());
  let technique = s.add_criterion(technique).await.unwrap();
  let rhythm = s.add_criterion(NewCriterion::new(level_id, "Rhythm", 2)).await.unwrap();
  (technique.criterion_id, rhythm.criterion_id)
}

#[tokio::test]
async fn criteria_are_listed_in_sequence() {
  let s = store().await;
  let f = fixture(&s).await;
  let (technique, rhythm) = criteria(&s, f.level_one).await;

  let listed = s.list_criteria(f.level_one).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].criterion_id, technique);
  assert_eq!(listed[0].score_descriptors.get(&3).map(String::as_str), Some("Fluent"));
  assert_eq!(listed[1].criterion_id, rhythm);
  assert!(s.list_criteria(f.level_two).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_open_assessment_is_rejected() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();
  let engine = Progression::new(&s);

  let open = engine.open_assessment(student, f.level_one, None).await.unwrap();
  assert_eq!(open.version, 1);
  let err = engine.open_assessment(student, f.level_one, None).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::AssessmentAlreadyOpen { .. }));

  // Another level is unaffected.
  engine.open_assessment(student, f.level_two, None).await.unwrap();
}

#[tokio::test]
async fn writes_under_unknown_parents_are_not_found() {
  let s = store().await;
  let (level_id, lesson_id) = (Uuid::new_v4(), Uuid::new_v4());
  let settings = ProgressionSettings::new(Uuid::new_v4(), 60.0);

  let assessment =
    StudentLevelAssessment::open(Uuid::new_v4(), level_id, None, &settings, Utc::now());
  let err = s.insert_assessment(assessment).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::LevelNotFound(id) if id == level_id));

  let progress = StudentLessonProgress::new(Uuid::new_v4(), lesson_id, Utc::now());
  let err = s.put_lesson_progress(progress).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::LessonNotFound(id) if id == lesson_id));
}

#[tokio::test]
async fn passing_assessment_allows_advancing() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |i| i.allow_cross_level_progression = false).await;
  let (technique, rhythm) = criteria(&s, f.level_one).await;
  let (student, instructor) = (Uuid::new_v4(), Uuid::new_v4());
  let engine = Progression::new(&s);

  let open = engine.open_assessment(student, f.level_one, None).await.unwrap();
  assert!(!open.can_continue_next_level);

  let scores: CriteriaScores = [(technique, 3), (rhythm, 1)].into_iter().collect();
  let submission = engine
    .submit_scores(open.assessment_id, scores, instructor, false)
    .await
    .unwrap();
  // (3*2 + 1*1) / (3*2 + 3*1) = 7/9
  assert!((submission.outcome.overall_score - 700.0 / 9.0).abs() < 1e-9);
  assert!(submission.outcome.passed);
  assert_eq!(submission.assessment.status, AssessmentStatus::Completed);
  assert!(!engine.can_advance(open.assessment_id).await.unwrap());

  let closed = engine.finalize_assessment(open.assessment_id).await.unwrap();
  assert_eq!(closed.status, AssessmentStatus::Passed);
  assert!(closed.can_continue_next_level);
  assert!(engine.can_advance(open.assessment_id).await.unwrap());

  // The cycle is closed, so a new one may open.
  engine.open_assessment(student, f.level_one, None).await.unwrap();
}

#[tokio::test]
async fn score_below_criterion_minimum_fails() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let (technique, rhythm) = criteria(&s, f.level_one).await;
  let engine = Progression::new(&s);

  let open = engine.open_assessment(Uuid::new_v4(), f.level_one, None).await.unwrap();
  let scores: CriteriaScores = [(technique, 3), (rhythm, 0)].into_iter().collect();
  let submission = engine
    .submit_scores(open.assessment_id, scores, Uuid::new_v4(), true)
    .await
    .unwrap();

  assert!(!submission.outcome.passed);
  assert_eq!(submission.outcome.below_minimum, vec![rhythm]);
  assert_eq!(submission.assessment.status, AssessmentStatus::Failed);
  assert!(!submission.assessment.can_continue_next_level);
}

#[tokio::test]
async fn foreign_criterion_is_rejected() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  criteria(&s, f.level_one).await;
  let engine = Progression::new(&s);

  let open = engine.open_assessment(Uuid::new_v4(), f.level_one, None).await.unwrap();
  let stranger = Uuid::new_v4();
  let scores: CriteriaScores = [(stranger, 2)].into_iter().collect();
  let err = engine
    .submit_scores(open.assessment_id, scores, Uuid::new_v4(), false)
    .await
    .unwrap_err();
  assert!(matches!(core_error(err), CoreError::UnknownCriterion(id) if id == stranger));
}

#[tokio::test]
async fn suspension_overrides_a_pass_until_reinstated() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let (technique, rhythm) = criteria(&s, f.level_one).await;
  let engine = Progression::new(&s);

  let student = Uuid::new_v4();
  let open = engine.open_assessment(student, f.level_one, None).await.unwrap();
  let scores: CriteriaScores = [(technique, 3), (rhythm, 3)].into_iter().collect();
  engine
    .submit_scores(open.assessment_id, scores, Uuid::new_v4(), true)
    .await
    .unwrap();
  assert!(engine.can_advance(open.assessment_id).await.unwrap());

  let suspended = engine
    .suspend_assessment(open.assessment_id, Some("attendance".into()))
    .await
    .unwrap();
  assert_eq!(suspended.status, AssessmentStatus::Suspended);
  assert_eq!(suspended.suspended_from, Some(AssessmentStatus::Passed));
  assert!(!suspended.can_continue_next_level);
  assert!(!engine.can_advance(open.assessment_id).await.unwrap());

  let err = engine.suspend_assessment(open.assessment_id, None).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::InvalidTransition { .. }));

  let reinstated = engine.reinstate_assessment(open.assessment_id).await.unwrap();
  assert_eq!(reinstated.status, AssessmentStatus::Pending);
  assert!(!reinstated.progression_suspended);
  assert!(reinstated.suspension_reason.is_none());
  // Pending with cross-level progression allowed.
  assert!(engine.can_advance(open.assessment_id).await.unwrap());

  // The cleared score no longer feeds the assessment average.
  let stored = s.get_assessment(open.assessment_id).await.unwrap().unwrap();
  assert!(stored.overall_score.is_none());
  assert!(!stored.criteria_scores.is_empty());
  let row = engine
    .aggregate(EntityType::Student, student, today(), false)
    .await
    .unwrap();
  assert_eq!(row.metrics.assessments_pending, 1);
  assert!(row.metrics.average_assessment_score.is_none());
}

#[tokio::test]
async fn stale_assessment_write_conflicts() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let engine = Progression::new(&s);

  let open = engine.open_assessment(Uuid::new_v4(), f.level_one, None).await.unwrap();
  engine.suspend_assessment(open.assessment_id, None).await.unwrap();

  let err = s.update_assessment(open).await.unwrap_err();
  assert!(matches!(core_error(err), CoreError::VersionConflict { expected: 1, .. }));
}

#[tokio::test]
async fn assessments_list_newest_first() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();
  let engine = Progression::new(&s);

  let first = engine.open_assessment(student, f.level_one, None).await.unwrap();
  let second = engine.open_assessment(student, f.level_two, None).await.unwrap();

  let all = s.list_assessments(student, None).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].assessment_id, second.assessment_id);

  let level_one = s.list_assessments(student, Some(f.level_one)).await.unwrap();
  assert_eq!(level_one.len(), 1);
  assert_eq!(level_one[0].assessment_id, first.assessment_id);
}

// ─── Analytics ───────────────────────────────────────────────────────────────

fn today() -> Period {
  Period::containing(PeriodType::Daily, Utc::now().date_naive()).unwrap()
}

#[tokio::test]
async fn student_snapshot_counts_current_activity() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();

  grade(&s, student, f.lessons[0][0], 3).await;
  grade(&s, student, f.lessons[0][1], 1).await;
  Progression::new(&s).record_attempt(student, f.lessons[0][2], 10).await.unwrap();

  let row = Progression::new(&s)
    .aggregate(EntityType::Student, student, today(), false)
    .await
    .unwrap();
  assert_eq!(row.metrics.lessons_tracked, 3);
  assert_eq!(row.metrics.lessons_completed, 2);
  assert_eq!(row.metrics.graded_lessons, 2);
  assert_eq!(row.metrics.average_stars, Some(2.0));
  assert_eq!(row.metrics.total_time_spent_minutes, Some(10));

  // Not persisted.
  assert!(s.latest_analytics(row.key()).await.unwrap().is_none());
}

#[tokio::test]
async fn activity_outside_the_period_is_ignored() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();
  grade(&s, student, f.lessons[0][0], 3).await;

  let start = Utc::now() - Duration::days(30);
  let period = Period::custom(start, start + Duration::days(1)).unwrap();
  let row = Progression::new(&s)
    .aggregate(EntityType::Student, student, period, false)
    .await
    .unwrap();
  assert_eq!(row.metrics.lessons_tracked, 0);
  assert_eq!(row.metrics.completion_rate, 0.0);
}

#[tokio::test]
async fn curriculum_snapshot_honours_tracking_toggles() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |i| {
    i.track_time_spent = false;
    i.track_star_distribution = false;
  })
  .await;
  grade(&s, Uuid::new_v4(), f.lessons[0][0], 3).await;
  grade(&s, Uuid::new_v4(), f.lessons[2][0], 2).await;

  let row = Progression::new(&s)
    .aggregate(EntityType::Curriculum, f.curriculum_id, today(), false)
    .await
    .unwrap();
  assert_eq!(row.metrics.lessons_tracked, 2);
  assert!(row.metrics.total_time_spent_minutes.is_none());
  assert!(row.metrics.star_distribution.is_none());
}

#[tokio::test]
async fn instructor_snapshot_covers_graded_work() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let instructor = Uuid::new_v4();
  let engine = Progression::new(&s);

  for student in [Uuid::new_v4(), Uuid::new_v4()] {
    engine
      .grade_lesson(GradeLesson {
        student_id: student,
        lesson_id: f.lessons[0][0],
        stars: 2,
        instructor_id: instructor,
        expected_version: None,
      })
      .await
      .unwrap();
  }
  grade(&s, Uuid::new_v4(), f.lessons[0][0], 3).await;

  let row = engine
    .aggregate(EntityType::Instructor, instructor, today(), false)
    .await
    .unwrap();
  assert_eq!(row.metrics.graded_lessons, 2);
  assert_eq!(row.metrics.star_distribution.unwrap().get(&2), Some(&2));
}

#[tokio::test]
async fn persisted_snapshots_append_and_newest_wins() {
  let s = store().await;
  let f = fixture(&s).await;
  configure(&s, f.curriculum_id, |_| {}).await;
  let student = Uuid::new_v4();
  let engine = Progression::new(&s);
  let period = today();

  let first = engine
    .aggregate(EntityType::Student, student, period, true)
    .await
    .unwrap();
  assert_eq!(first.metrics.lessons_tracked, 0);

  grade(&s, student, f.lessons[0][0], 3).await;
  let second = engine
    .aggregate(EntityType::Student, student, period, true)
    .await
    .unwrap();
  assert_ne!(first.analytics_id, second.analytics_id);

  let latest = s.latest_analytics(first.key()).await.unwrap().unwrap();
  assert_eq!(latest.analytics_id, second.analytics_id);
  assert_eq!(latest.metrics, second.metrics);
  assert_eq!(latest.period_end, period.end);
}
