//! [`SqliteStore`], the SQLite implementation of [`ProgressionStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension as _};
use tracing::debug;
use uuid::Uuid;

use academy_core::{
  analytics::{AnalyticsKey, EntityType, ProgressionAnalytics},
  assessment::StudentLevelAssessment,
  criteria::{LevelAssessmentCriterion, NewCriterion},
  curriculum::{Curriculum, Lesson, Level, Module, NewLesson, NewLevel, NewModule},
  progress::StudentLessonProgress,
  settings::{NewSettings, ProgressionSettings, SettingsStatus},
  store::ProgressionStore,
  unlock::StudentModuleUnlock,
};

use crate::{
  Error, Result,
  encode::{
    RawAnalytics, RawAssessment, RawCriterion, RawCurriculum, RawLesson, RawLevel, RawModule,
    RawProgress, RawSettings, RawUnlock, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a conditional write.
enum Write {
  Done,
  /// No row matched the expected version (or the insert key was taken).
  Stale,
  /// A foreign key named a parent row that does not exist.
  MissingParent,
  /// Any other constraint failure.
  Constraint(rusqlite::Error),
}

fn classify(result: rusqlite::Result<usize>) -> rusqlite::Result<Write> {
  match result {
    Ok(0) => Ok(Write::Stale),
    Ok(_) => Ok(Write::Done),
    Err(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
    {
      Ok(Write::MissingParent)
    }
    Err(rusqlite::Error::SqliteFailure(e, msg)) if e.code == ErrorCode::ConstraintViolation => {
      Ok(Write::Constraint(rusqlite::Error::SqliteFailure(e, msg)))
    }
    Err(e) => Err(e),
  }
}

fn rejected(e: rusqlite::Error) -> Error { Error::Database(tokio_rusqlite::Error::Rusqlite(e)) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A progression store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Whether a row with primary key `id` exists in `table`.
  async fn exists(&self, table: &'static str, key: &'static str, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let sql = format!("SELECT 1 FROM {table} WHERE {key} = ?1");

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], |_| Ok(()))
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(found)
  }

  async fn progress_by_id(&self, progress_id: Uuid) -> Result<StudentLessonProgress> {
    let id_str = encode_uuid(progress_id);

    let raw: RawProgress = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM lesson_progress p WHERE p.progress_id = ?1",
          RawProgress::COLUMNS
        );
        Ok(conn.query_row(&sql, rusqlite::params![id_str], RawProgress::from_row)?)
      })
      .await?;

    raw.into_progress()
  }

  async fn query_progress(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<StudentLessonProgress>> {
    let raws: Vec<RawProgress> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawProgress::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProgress::into_progress).collect()
  }

  async fn query_assessments(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<StudentLevelAssessment>> {
    let raws: Vec<RawAssessment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawAssessment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssessment::into_assessment).collect()
  }
}

// ─── ProgressionStore impl ───────────────────────────────────────────────────

impl ProgressionStore for SqliteStore {
  type Error = Error;

  // ── Curriculum structure ──────────────────────────────────────────────────

  async fn add_curriculum(&self, name: String) -> Result<Curriculum> {
    if name.trim().is_empty() {
      return Err(academy_core::Error::Validation("curriculum name must not be empty".into()).into());
    }

    let curriculum = Curriculum {
      curriculum_id: Uuid::new_v4(),
      name,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(curriculum.curriculum_id);
    let name   = curriculum.name.clone();
    let at_str = encode_dt(curriculum.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO curricula (curriculum_id, name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(curriculum)
  }

  async fn add_level(&self, input: NewLevel) -> Result<Level> {
    if !self.exists("curricula", "curriculum_id", input.curriculum_id).await? {
      return Err(academy_core::Error::CurriculumNotFound(input.curriculum_id).into());
    }

    let level = Level {
      level_id:       Uuid::new_v4(),
      curriculum_id:  input.curriculum_id,
      name:           input.name,
      sequence_order: input.sequence_order,
      created_at:     Utc::now(),
    };

    let id_str         = encode_uuid(level.level_id);
    let curriculum_str = encode_uuid(level.curriculum_id);
    let name           = level.name.clone();
    let seq            = level.sequence_order;
    let at_str         = encode_dt(level.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO levels (level_id, curriculum_id, name, sequence_order, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, curriculum_str, name, seq, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(level)
  }

  async fn add_module(&self, input: NewModule) -> Result<Module> {
    let level = self
      .get_level(input.level_id)
      .await?
      .ok_or(academy_core::Error::LevelNotFound(input.level_id))?;

    let module = Module {
      module_id:      Uuid::new_v4(),
      level_id:       level.level_id,
      curriculum_id:  level.curriculum_id,
      name:           input.name,
      sequence_order: input.sequence_order,
      created_at:     Utc::now(),
    };

    let id_str    = encode_uuid(module.module_id);
    let level_str = encode_uuid(module.level_id);
    let name      = module.name.clone();
    let seq       = module.sequence_order;
    let at_str    = encode_dt(module.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO modules (module_id, level_id, name, sequence_order, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, level_str, name, seq, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(module)
  }

  async fn add_lesson(&self, input: NewLesson) -> Result<Lesson> {
    input.validate()?;
    if !self.exists("modules", "module_id", input.module_id).await? {
      return Err(academy_core::Error::ModuleNotFound(input.module_id).into());
    }

    let lesson = Lesson {
      lesson_id:      Uuid::new_v4(),
      module_id:      input.module_id,
      name:           input.name,
      sequence_order: input.sequence_order,
      max_stars:      input.max_stars,
      created_at:     Utc::now(),
    };

    let id_str     = encode_uuid(lesson.lesson_id);
    let module_str = encode_uuid(lesson.module_id);
    let name       = lesson.name.clone();
    let seq        = lesson.sequence_order;
    let max_stars  = lesson.max_stars;
    let at_str     = encode_dt(lesson.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lessons (lesson_id, module_id, name, sequence_order, max_stars, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, module_str, name, seq, max_stars, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(lesson)
  }

  async fn get_curriculum(&self, id: Uuid) -> Result<Option<Curriculum>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCurriculum> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM curricula WHERE curriculum_id = ?1",
          RawCurriculum::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawCurriculum::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCurriculum::into_curriculum).transpose()
  }

  async fn get_level(&self, id: Uuid) -> Result<Option<Level>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawLevel> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM levels WHERE level_id = ?1", RawLevel::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawLevel::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLevel::into_level).transpose()
  }

  async fn get_module(&self, id: Uuid) -> Result<Option<Module>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawModule> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM modules m JOIN levels l ON l.level_id = m.level_id
           WHERE m.module_id = ?1",
          RawModule::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawModule::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawModule::into_module).transpose()
  }

  async fn get_lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawLesson> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM lessons WHERE lesson_id = ?1", RawLesson::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawLesson::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLesson::into_lesson).transpose()
  }

  async fn curriculum_modules(&self, curriculum_id: Uuid) -> Result<Vec<Module>> {
    let id_str = encode_uuid(curriculum_id);

    let raws: Vec<RawModule> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM modules m JOIN levels l ON l.level_id = m.level_id
           WHERE l.curriculum_id = ?1
           ORDER BY l.sequence_order, l.created_at, m.sequence_order, m.created_at",
          RawModule::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawModule::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawModule::into_module).collect()
  }

  async fn module_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>> {
    let id_str = encode_uuid(module_id);

    let raws: Vec<RawLesson> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM lessons WHERE module_id = ?1 ORDER BY sequence_order, created_at",
          RawLesson::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawLesson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLesson::into_lesson).collect()
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  async fn configure_settings(&self, input: NewSettings) -> Result<ProgressionSettings> {
    input.validate()?;
    let curriculum_id = input.curriculum_id;
    if !self.exists("curricula", "curriculum_id", curriculum_id).await? {
      return Err(academy_core::Error::CurriculumNotFound(curriculum_id).into());
    }

    let s = input.into_settings(Uuid::new_v4(), Utc::now());
    let new_id_str     = encode_uuid(s.settings_id);
    let curriculum_str = encode_uuid(s.curriculum_id);
    let at_str         = encode_dt(s.updated_at);

    let raw: RawSettings = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let active: Option<String> = tx
          .query_row(
            "SELECT settings_id FROM progression_settings
             WHERE curriculum_id = ?1 AND status = 'active'",
            rusqlite::params![curriculum_str],
            |r| r.get(0),
          )
          .optional()?;

        let settings_id = match active {
          Some(existing) => {
            tx.execute(
              "UPDATE progression_settings SET
                 module_unlock_threshold_percentage  = ?2,
                 require_minimum_one_star_per_lesson = ?3,
                 allow_cross_level_progression       = ?4,
                 allow_lesson_retakes                = ?5,
                 passing_score_percentage            = ?6,
                 track_time_spent                    = ?7,
                 track_star_distribution             = ?8,
                 updated_at                          = ?9
               WHERE settings_id = ?1",
              rusqlite::params![
                existing,
                s.module_unlock_threshold_percentage,
                s.require_minimum_one_star_per_lesson,
                s.allow_cross_level_progression,
                s.allow_lesson_retakes,
                s.passing_score_percentage,
                s.track_time_spent,
                s.track_star_distribution,
                at_str,
              ],
            )?;
            existing
          }
          None => {
            tx.execute(
              "INSERT INTO progression_settings (
                 settings_id, curriculum_id, module_unlock_threshold_percentage,
                 require_minimum_one_star_per_lesson, allow_cross_level_progression,
                 allow_lesson_retakes, passing_score_percentage, track_time_spent,
                 track_star_distribution, status, created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active', ?10, ?10)",
              rusqlite::params![
                new_id_str,
                curriculum_str,
                s.module_unlock_threshold_percentage,
                s.require_minimum_one_star_per_lesson,
                s.allow_cross_level_progression,
                s.allow_lesson_retakes,
                s.passing_score_percentage,
                s.track_time_spent,
                s.track_star_distribution,
                at_str,
              ],
            )?;
            new_id_str
          }
        };

        let sql = format!(
          "SELECT {} FROM progression_settings WHERE settings_id = ?1",
          RawSettings::COLUMNS
        );
        let raw = tx.query_row(&sql, rusqlite::params![settings_id], RawSettings::from_row)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let settings = raw.into_settings()?;
    debug!(%curriculum_id, settings_id = %settings.settings_id, "progression settings configured");
    Ok(settings)
  }

  async fn get_settings(&self, curriculum_id: Uuid) -> Result<Option<ProgressionSettings>> {
    let id_str = encode_uuid(curriculum_id);

    let raw: Option<RawSettings> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM progression_settings WHERE curriculum_id = ?1 AND status = 'active'",
          RawSettings::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawSettings::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSettings::into_settings).transpose()
  }

  async fn deactivate_settings(&self, curriculum_id: Uuid) -> Result<Option<ProgressionSettings>> {
    let Some(mut settings) = self.get_settings(curriculum_id).await? else {
      return Ok(None);
    };

    settings.status = SettingsStatus::Inactive;
    settings.updated_at = Utc::now();

    let id_str     = encode_uuid(settings.settings_id);
    let status_str = settings.status.as_ref().to_owned();
    let at_str     = encode_dt(settings.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE progression_settings SET status = ?2, updated_at = ?3 WHERE settings_id = ?1",
          rusqlite::params![id_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(settings))
  }

  // ── Criteria ──────────────────────────────────────────────────────────────

  async fn add_criterion(&self, input: NewCriterion) -> Result<LevelAssessmentCriterion> {
    if !self.exists("levels", "level_id", input.level_id).await? {
      return Err(academy_core::Error::LevelNotFound(input.level_id).into());
    }

    let c = LevelAssessmentCriterion::from_new(input, Uuid::new_v4(), Utc::now())?;

    let id_str          = encode_uuid(c.criterion_id);
    let level_str       = encode_uuid(c.level_id);
    let name            = c.name.clone();
    let description     = c.description.clone();
    let seq             = c.sequence_order;
    let weight          = c.weight;
    let max_score       = c.max_score;
    let min_passing     = c.min_passing_score;
    let descriptors_str = serde_json::to_string(&c.score_descriptors)?;
    let at_str          = encode_dt(c.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO assessment_criteria (
             criterion_id, level_id, name, description, sequence_order,
             weight, max_score, min_passing_score, score_descriptors, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            level_str,
            name,
            description,
            seq,
            weight,
            max_score,
            min_passing,
            descriptors_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(c)
  }

  async fn list_criteria(&self, level_id: Uuid) -> Result<Vec<LevelAssessmentCriterion>> {
    let id_str = encode_uuid(level_id);

    let raws: Vec<RawCriterion> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM assessment_criteria WHERE level_id = ?1
           ORDER BY sequence_order, created_at",
          RawCriterion::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawCriterion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCriterion::into_criterion).collect()
  }

  // ── Lesson progress ───────────────────────────────────────────────────────

  async fn get_lesson_progress(
    &self,
    student_id: Uuid,
    lesson_id: Uuid,
  ) -> Result<Option<StudentLessonProgress>> {
    let student_str = encode_uuid(student_id);
    let lesson_str  = encode_uuid(lesson_id);

    let raw: Option<RawProgress> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM lesson_progress p WHERE p.student_id = ?1 AND p.lesson_id = ?2",
          RawProgress::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![student_str, lesson_str], RawProgress::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProgress::into_progress).transpose()
  }

  async fn put_lesson_progress(
    &self,
    progress: StudentLessonProgress,
  ) -> Result<StudentLessonProgress> {
    let progress_id = progress.progress_id;
    let lesson_id   = progress.lesson_id;
    let expected    = progress.version;

    let id_str      = encode_uuid(progress.progress_id);
    let student_str = encode_uuid(progress.student_id);
    let lesson_str  = encode_uuid(progress.lesson_id);
    let grader_str  = progress.graded_by_instructor_id.map(encode_uuid);
    let graded_str  = progress.graded_date.map(encode_dt);
    let created_str = encode_dt(progress.created_at);
    let updated_str = encode_dt(progress.updated_at);
    let stars       = progress.stars_earned;
    let completed   = progress.is_completed;
    let attempts    = progress.attempt_count;
    let minutes     = progress.total_time_spent_minutes;

    let write = self
      .conn
      .call(move |conn| {
        let result = if expected == 0 {
          conn.execute(
            "INSERT INTO lesson_progress (
               progress_id, student_id, lesson_id, stars_earned, is_completed,
               attempt_count, total_time_spent_minutes, graded_by_instructor_id,
               graded_date, version, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)
             ON CONFLICT DO NOTHING",
            rusqlite::params![
              id_str,
              student_str,
              lesson_str,
              stars,
              completed,
              attempts,
              minutes,
              grader_str,
              graded_str,
              created_str,
              updated_str,
            ],
          )
        } else {
          conn.execute(
            "UPDATE lesson_progress SET
               stars_earned             = ?3,
               is_completed             = ?4,
               attempt_count            = ?5,
               total_time_spent_minutes = ?6,
               graded_by_instructor_id  = ?7,
               graded_date              = ?8,
               updated_at               = ?9,
               version                  = version + 1
             WHERE progress_id = ?1 AND version = ?2",
            rusqlite::params![
              id_str,
              expected,
              stars,
              completed,
              attempts,
              minutes,
              grader_str,
              graded_str,
              updated_str,
            ],
          )
        };
        Ok(classify(result)?)
      })
      .await?;

    match write {
      Write::Done => self.progress_by_id(progress_id).await,
      Write::Stale => {
        Err(academy_core::Error::VersionConflict { id: progress_id, expected }.into())
      }
      Write::MissingParent => Err(academy_core::Error::LessonNotFound(lesson_id).into()),
      Write::Constraint(e) => Err(rejected(e)),
    }
  }

  async fn module_progress(
    &self,
    student_id: Uuid,
    module_id: Uuid,
  ) -> Result<Vec<StudentLessonProgress>> {
    let sql = format!(
      "SELECT {} FROM lesson_progress p JOIN lessons ls ON ls.lesson_id = p.lesson_id
       WHERE p.student_id = ?1 AND ls.module_id = ?2
       ORDER BY ls.sequence_order, ls.created_at",
      RawProgress::COLUMNS
    );
    self
      .query_progress(sql, vec![encode_uuid(student_id), encode_uuid(module_id)])
      .await
  }

  // ── Module unlocks ────────────────────────────────────────────────────────

  async fn get_module_unlock(
    &self,
    student_id: Uuid,
    module_id: Uuid,
  ) -> Result<Option<StudentModuleUnlock>> {
    let student_str = encode_uuid(student_id);
    let module_str  = encode_uuid(module_id);

    let raw: Option<RawUnlock> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM module_unlocks WHERE student_id = ?1 AND module_id = ?2",
          RawUnlock::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![student_str, module_str], RawUnlock::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUnlock::into_unlock).transpose()
  }

  async fn put_module_unlock(&self, unlock: StudentModuleUnlock) -> Result<StudentModuleUnlock> {
    let id_str        = encode_uuid(unlock.unlock_id);
    let student_str   = encode_uuid(unlock.student_id);
    let module_str    = encode_uuid(unlock.module_id);
    let unlocked_str  = unlock.unlocked_date.map(encode_dt);
    let evaluated_str = encode_dt(unlock.evaluated_at);

    // An unlock never reverts and keeps its first unlock date, even if a
    // concurrent evaluation computed otherwise.
    let raw: RawUnlock = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO module_unlocks (
             unlock_id, student_id, module_id, is_unlocked, unlocked_date,
             stars_earned, total_possible_stars, unlock_percentage,
             threshold_met, evaluated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (student_id, module_id) DO UPDATE SET
             is_unlocked          = MAX(module_unlocks.is_unlocked, excluded.is_unlocked),
             unlocked_date        = COALESCE(module_unlocks.unlocked_date, excluded.unlocked_date),
             stars_earned         = excluded.stars_earned,
             total_possible_stars = excluded.total_possible_stars,
             unlock_percentage    = excluded.unlock_percentage,
             threshold_met        = excluded.threshold_met,
             evaluated_at         = excluded.evaluated_at",
          rusqlite::params![
            id_str,
            student_str,
            module_str,
            unlock.is_unlocked,
            unlocked_str,
            unlock.stars_earned,
            unlock.total_possible_stars,
            unlock.unlock_percentage,
            unlock.threshold_met,
            evaluated_str,
          ],
        )?;

        let sql = format!(
          "SELECT {} FROM module_unlocks WHERE student_id = ?1 AND module_id = ?2",
          RawUnlock::COLUMNS
        );
        Ok(conn.query_row(&sql, rusqlite::params![student_str, module_str], RawUnlock::from_row)?)
      })
      .await?;

    raw.into_unlock()
  }

  async fn list_unlocks(&self, student_id: Uuid) -> Result<Vec<StudentModuleUnlock>> {
    let id_str = encode_uuid(student_id);

    let raws: Vec<RawUnlock> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM module_unlocks WHERE student_id = ?1 ORDER BY evaluated_at",
          RawUnlock::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawUnlock::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUnlock::into_unlock).collect()
  }

  // ── Level assessments ─────────────────────────────────────────────────────

  async fn insert_assessment(
    &self,
    assessment: StudentLevelAssessment,
  ) -> Result<StudentLevelAssessment> {
    let StudentLevelAssessment { assessment_id, student_id, level_id, .. } = assessment;

    let id_str         = encode_uuid(assessment_id);
    let student_str    = encode_uuid(student_id);
    let level_str      = encode_uuid(level_id);
    let instructor_str = assessment.instructor_id.map(encode_uuid);
    let status_str     = assessment.status.as_ref().to_owned();
    let scores_str     = serde_json::to_string(&assessment.criteria_scores)?;
    let from_str       = assessment.suspended_from.map(|s| s.as_ref().to_owned());
    let assessed_str   = assessment.assessed_at.map(encode_dt);
    let created_str    = encode_dt(assessment.created_at);
    let updated_str    = encode_dt(assessment.updated_at);
    let overall        = assessment.overall_score;
    let passed         = assessment.passed;
    let can_continue   = assessment.can_continue_next_level;
    let suspended      = assessment.progression_suspended;
    let reason         = assessment.suspension_reason.clone();

    let write = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO level_assessments (
             assessment_id, student_id, level_id, instructor_id, status,
             criteria_scores, overall_score, passed, can_continue_next_level,
             progression_suspended, suspension_reason, suspended_from,
             assessed_at, version, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?15)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            id_str,
            student_str,
            level_str,
            instructor_str,
            status_str,
            scores_str,
            overall,
            passed,
            can_continue,
            suspended,
            reason,
            from_str,
            assessed_str,
            created_str,
            updated_str,
          ],
        );
        Ok(classify(result)?)
      })
      .await?;

    match write {
      Write::Done => Ok(StudentLevelAssessment { version: 1, ..assessment }),
      // `ON CONFLICT DO NOTHING` absorbed the open-cycle index.
      Write::Stale => {
        Err(academy_core::Error::AssessmentAlreadyOpen { student_id, level_id }.into())
      }
      Write::MissingParent => Err(academy_core::Error::LevelNotFound(level_id).into()),
      Write::Constraint(e) => Err(rejected(e)),
    }
  }

  async fn get_assessment(&self, id: Uuid) -> Result<Option<StudentLevelAssessment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawAssessment> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM level_assessments a WHERE a.assessment_id = ?1",
          RawAssessment::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawAssessment::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAssessment::into_assessment).transpose()
  }

  async fn update_assessment(
    &self,
    assessment: StudentLevelAssessment,
  ) -> Result<StudentLevelAssessment> {
    let StudentLevelAssessment { assessment_id, student_id, level_id, version, .. } = assessment;

    let id_str         = encode_uuid(assessment_id);
    let instructor_str = assessment.instructor_id.map(encode_uuid);
    let status_str     = assessment.status.as_ref().to_owned();
    let scores_str     = serde_json::to_string(&assessment.criteria_scores)?;
    let from_str       = assessment.suspended_from.map(|s| s.as_ref().to_owned());
    let assessed_str   = assessment.assessed_at.map(encode_dt);
    let updated_str    = encode_dt(assessment.updated_at);
    let overall        = assessment.overall_score;
    let passed         = assessment.passed;
    let can_continue   = assessment.can_continue_next_level;
    let suspended      = assessment.progression_suspended;
    let reason         = assessment.suspension_reason.clone();

    let write = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "UPDATE level_assessments SET
             instructor_id           = ?3,
             status                  = ?4,
             criteria_scores         = ?5,
             overall_score           = ?6,
             passed                  = ?7,
             can_continue_next_level = ?8,
             progression_suspended   = ?9,
             suspension_reason       = ?10,
             suspended_from          = ?11,
             assessed_at             = ?12,
             updated_at              = ?13,
             version                 = version + 1
           WHERE assessment_id = ?1 AND version = ?2",
          rusqlite::params![
            id_str,
            version,
            instructor_str,
            status_str,
            scores_str,
            overall,
            passed,
            can_continue,
            suspended,
            reason,
            from_str,
            assessed_str,
            updated_str,
          ],
        );
        Ok(classify(result)?)
      })
      .await?;

    match write {
      Write::Done => Ok(StudentLevelAssessment { version: version + 1, ..assessment }),
      Write::Stale => {
        Err(academy_core::Error::VersionConflict { id: assessment_id, expected: version }.into())
      }
      // Reopening a closed cycle while another one is open.
      Write::Constraint(_) => {
        Err(academy_core::Error::AssessmentAlreadyOpen { student_id, level_id }.into())
      }
      Write::MissingParent => Err(academy_core::Error::LevelNotFound(level_id).into()),
    }
  }

  async fn list_assessments(
    &self,
    student_id: Uuid,
    level_id: Option<Uuid>,
  ) -> Result<Vec<StudentLevelAssessment>> {
    let mut params = vec![encode_uuid(student_id)];
    let mut sql = format!(
      "SELECT {} FROM level_assessments a WHERE a.student_id = ?1",
      RawAssessment::COLUMNS
    );
    if let Some(level_id) = level_id {
      sql.push_str(" AND a.level_id = ?2");
      params.push(encode_uuid(level_id));
    }
    sql.push_str(" ORDER BY a.created_at DESC, a.rowid DESC");

    self.query_assessments(sql, params).await
  }

  // ── Analytics ─────────────────────────────────────────────────────────────

  async fn progress_for_entity(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> Result<Vec<StudentLessonProgress>> {
    let filter = match entity_type {
      EntityType::Student => "FROM lesson_progress p WHERE p.student_id = ?1",
      EntityType::Instructor => "FROM lesson_progress p WHERE p.graded_by_instructor_id = ?1",
      EntityType::Curriculum => {
        "FROM lesson_progress p
         JOIN lessons ls ON ls.lesson_id = p.lesson_id
         JOIN modules m  ON m.module_id  = ls.module_id
         JOIN levels l   ON l.level_id   = m.level_id
         WHERE l.curriculum_id = ?1"
      }
    };
    let sql = format!("SELECT {} {filter} ORDER BY p.updated_at", RawProgress::COLUMNS);
    self.query_progress(sql, vec![encode_uuid(entity_id)]).await
  }

  async fn assessments_for_entity(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> Result<Vec<StudentLevelAssessment>> {
    let filter = match entity_type {
      EntityType::Student => "FROM level_assessments a WHERE a.student_id = ?1",
      EntityType::Instructor => "FROM level_assessments a WHERE a.instructor_id = ?1",
      EntityType::Curriculum => {
        "FROM level_assessments a
         JOIN levels l ON l.level_id = a.level_id
         WHERE l.curriculum_id = ?1"
      }
    };
    let sql = format!("SELECT {} {filter} ORDER BY a.updated_at", RawAssessment::COLUMNS);
    self.query_assessments(sql, vec![encode_uuid(entity_id)]).await
  }

  async fn append_analytics(&self, row: ProgressionAnalytics) -> Result<ProgressionAnalytics> {
    let id_str        = encode_uuid(row.analytics_id);
    let entity_type   = row.entity_type.as_ref().to_owned();
    let entity_str    = encode_uuid(row.entity_id);
    let period_type   = row.period_type.as_ref().to_owned();
    let start_str     = encode_dt(row.period_start);
    let end_str       = encode_dt(row.period_end);
    let metrics_str   = serde_json::to_string(&row.metrics)?;
    let generated_str = encode_dt(row.generated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO progression_analytics (
             analytics_id, entity_type, entity_id, period_type,
             period_start, period_end, metrics_json, generated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            entity_type,
            entity_str,
            period_type,
            start_str,
            end_str,
            metrics_str,
            generated_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(row)
  }

  async fn latest_analytics(&self, key: AnalyticsKey) -> Result<Option<ProgressionAnalytics>> {
    let entity_type = key.entity_type.as_ref().to_owned();
    let entity_str  = encode_uuid(key.entity_id);
    let period_type = key.period_type.as_ref().to_owned();
    let start_str   = encode_dt(key.period_start);

    let raw: Option<RawAnalytics> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM progression_analytics
           WHERE entity_type = ?1 AND entity_id = ?2 AND period_type = ?3 AND period_start = ?4
           ORDER BY generated_at DESC, rowid DESC
           LIMIT 1",
          RawAnalytics::COLUMNS
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![entity_type, entity_str, period_type, start_str],
              RawAnalytics::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAnalytics::into_analytics).transpose()
  }
}
