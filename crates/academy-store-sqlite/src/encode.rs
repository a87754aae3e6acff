//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that lexical order matches time order. UUIDs are
//! hyphenated lowercase strings. Enums use their lowercase names. Free-form
//! maps are stored as compact JSON.

use std::str::FromStr;

use academy_core::{
  analytics::{EntityType, PeriodType, ProgressionAnalytics},
  assessment::{AssessmentStatus, CriteriaScores, StudentLevelAssessment},
  criteria::{LevelAssessmentCriterion, ScoreDescriptors},
  curriculum::{Curriculum, Lesson, Level, Module},
  progress::StudentLessonProgress,
  settings::{ProgressionSettings, SettingsStatus},
  unlock::StudentModuleUnlock,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

/// Parse a strum-backed enum from its stored name.
pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::UnknownVariant { kind, value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `Raw*` struct holds the column values exactly as read. `COLUMNS` lists
// them in `from_row` order so queries and decoders cannot drift apart.

pub struct RawCurriculum {
  pub curriculum_id: String,
  pub name:          String,
  pub created_at:    String,
}

impl RawCurriculum {
  pub const COLUMNS: &'static str = "curriculum_id, name, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      curriculum_id: row.get(0)?,
      name:          row.get(1)?,
      created_at:    row.get(2)?,
    })
  }

  pub fn into_curriculum(self) -> Result<Curriculum> {
    Ok(Curriculum {
      curriculum_id: decode_uuid(&self.curriculum_id)?,
      name:          self.name,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawLevel {
  pub level_id:       String,
  pub curriculum_id:  String,
  pub name:           String,
  pub sequence_order: i32,
  pub created_at:     String,
}

impl RawLevel {
  pub const COLUMNS: &'static str = "level_id, curriculum_id, name, sequence_order, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      level_id:       row.get(0)?,
      curriculum_id:  row.get(1)?,
      name:           row.get(2)?,
      sequence_order: row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_level(self) -> Result<Level> {
    Ok(Level {
      level_id:       decode_uuid(&self.level_id)?,
      curriculum_id:  decode_uuid(&self.curriculum_id)?,
      name:           self.name,
      sequence_order: self.sequence_order,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Read from `modules m JOIN levels l`.
pub struct RawModule {
  pub module_id:      String,
  pub level_id:       String,
  pub curriculum_id:  String,
  pub name:           String,
  pub sequence_order: i32,
  pub created_at:     String,
}

impl RawModule {
  pub const COLUMNS: &'static str =
    "m.module_id, m.level_id, l.curriculum_id, m.name, m.sequence_order, m.created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      module_id:      row.get(0)?,
      level_id:       row.get(1)?,
      curriculum_id:  row.get(2)?,
      name:           row.get(3)?,
      sequence_order: row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_module(self) -> Result<Module> {
    Ok(Module {
      module_id:      decode_uuid(&self.module_id)?,
      level_id:       decode_uuid(&self.level_id)?,
      curriculum_id:  decode_uuid(&self.curriculum_id)?,
      name:           self.name,
      sequence_order: self.sequence_order,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawLesson {
  pub lesson_id:      String,
  pub module_id:      String,
  pub name:           String,
  pub sequence_order: i32,
  pub max_stars:      u8,
  pub created_at:     String,
}

impl RawLesson {
  pub const COLUMNS: &'static str =
    "lesson_id, module_id, name, sequence_order, max_stars, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      lesson_id:      row.get(0)?,
      module_id:      row.get(1)?,
      name:           row.get(2)?,
      sequence_order: row.get(3)?,
      max_stars:      row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_lesson(self) -> Result<Lesson> {
    Ok(Lesson {
      lesson_id:      decode_uuid(&self.lesson_id)?,
      module_id:      decode_uuid(&self.module_id)?,
      name:           self.name,
      sequence_order: self.sequence_order,
      max_stars:      self.max_stars,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSettings {
  pub settings_id:                         String,
  pub curriculum_id:                       String,
  pub module_unlock_threshold_percentage:  f64,
  pub require_minimum_one_star_per_lesson: bool,
  pub allow_cross_level_progression:       bool,
  pub allow_lesson_retakes:                bool,
  pub passing_score_percentage:            f64,
  pub track_time_spent:                    bool,
  pub track_star_distribution:             bool,
  pub status:                              String,
  pub created_at:                          String,
  pub updated_at:                          String,
}

impl RawSettings {
  pub const COLUMNS: &'static str = "settings_id, curriculum_id,
    module_unlock_threshold_percentage, require_minimum_one_star_per_lesson,
    allow_cross_level_progression, allow_lesson_retakes, passing_score_percentage,
    track_time_spent, track_star_distribution, status, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      settings_id:                         row.get(0)?,
      curriculum_id:                       row.get(1)?,
      module_unlock_threshold_percentage:  row.get(2)?,
      require_minimum_one_star_per_lesson: row.get(3)?,
      allow_cross_level_progression:       row.get(4)?,
      allow_lesson_retakes:                row.get(5)?,
      passing_score_percentage:            row.get(6)?,
      track_time_spent:                    row.get(7)?,
      track_star_distribution:             row.get(8)?,
      status:                              row.get(9)?,
      created_at:                          row.get(10)?,
      updated_at:                          row.get(11)?,
    })
  }

  pub fn into_settings(self) -> Result<ProgressionSettings> {
    Ok(ProgressionSettings {
      settings_id: decode_uuid(&self.settings_id)?,
      curriculum_id: decode_uuid(&self.curriculum_id)?,
      module_unlock_threshold_percentage: self.module_unlock_threshold_percentage,
      require_minimum_one_star_per_lesson: self.require_minimum_one_star_per_lesson,
      allow_cross_level_progression: self.allow_cross_level_progression,
      allow_lesson_retakes: self.allow_lesson_retakes,
      passing_score_percentage: self.passing_score_percentage,
      track_time_spent: self.track_time_spent,
      track_star_distribution: self.track_star_distribution,
      status: decode_enum::<SettingsStatus>("settings status", &self.status)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawCriterion {
  pub criterion_id:      String,
  pub level_id:          String,
  pub name:              String,
  pub description:       Option<String>,
  pub sequence_order:    i32,
  pub weight:            f64,
  pub max_score:         u8,
  pub min_passing_score: u8,
  pub score_descriptors: String,
  pub created_at:        String,
}

impl RawCriterion {
  pub const COLUMNS: &'static str = "criterion_id, level_id, name, description,
    sequence_order, weight, max_score, min_passing_score, score_descriptors, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      criterion_id:      row.get(0)?,
      level_id:          row.get(1)?,
      name:              row.get(2)?,
      description:       row.get(3)?,
      sequence_order:    row.get(4)?,
      weight:            row.get(5)?,
      max_score:         row.get(6)?,
      min_passing_score: row.get(7)?,
      score_descriptors: row.get(8)?,
      created_at:        row.get(9)?,
    })
  }

  pub fn into_criterion(self) -> Result<LevelAssessmentCriterion> {
    let score_descriptors: ScoreDescriptors = serde_json::from_str(&self.score_descriptors)?;
    Ok(LevelAssessmentCriterion {
      criterion_id: decode_uuid(&self.criterion_id)?,
      level_id: decode_uuid(&self.level_id)?,
      name: self.name,
      description: self.description,
      sequence_order: self.sequence_order,
      weight: self.weight,
      max_score: self.max_score,
      min_passing_score: self.min_passing_score,
      score_descriptors,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawProgress {
  pub progress_id:              String,
  pub student_id:               String,
  pub lesson_id:                String,
  pub stars_earned:             Option<u8>,
  pub is_completed:             bool,
  pub attempt_count:            u32,
  pub total_time_spent_minutes: u32,
  pub graded_by_instructor_id:  Option<String>,
  pub graded_date:              Option<String>,
  pub version:                  u32,
  pub created_at:               String,
  pub updated_at:               String,
}

impl RawProgress {
  pub const COLUMNS: &'static str = "p.progress_id, p.student_id, p.lesson_id, p.stars_earned,
    p.is_completed, p.attempt_count, p.total_time_spent_minutes,
    p.graded_by_instructor_id, p.graded_date, p.version, p.created_at, p.updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      progress_id:              row.get(0)?,
      student_id:               row.get(1)?,
      lesson_id:                row.get(2)?,
      stars_earned:             row.get(3)?,
      is_completed:             row.get(4)?,
      attempt_count:            row.get(5)?,
      total_time_spent_minutes: row.get(6)?,
      graded_by_instructor_id:  row.get(7)?,
      graded_date:              row.get(8)?,
      version:                  row.get(9)?,
      created_at:               row.get(10)?,
      updated_at:               row.get(11)?,
    })
  }

  pub fn into_progress(self) -> Result<StudentLessonProgress> {
    Ok(StudentLessonProgress {
      progress_id:              decode_uuid(&self.progress_id)?,
      student_id:               decode_uuid(&self.student_id)?,
      lesson_id:                decode_uuid(&self.lesson_id)?,
      stars_earned:             self.stars_earned,
      is_completed:             self.is_completed,
      attempt_count:            self.attempt_count,
      total_time_spent_minutes: self.total_time_spent_minutes,
      graded_by_instructor_id:  decode_opt_uuid(self.graded_by_instructor_id)?,
      graded_date:              decode_opt_dt(self.graded_date)?,
      version:                  self.version,
      created_at:               decode_dt(&self.created_at)?,
      updated_at:               decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawUnlock {
  pub unlock_id:            String,
  pub student_id:           String,
  pub module_id:            String,
  pub is_unlocked:          bool,
  pub unlocked_date:        Option<String>,
  pub stars_earned:         u32,
  pub total_possible_stars: u32,
  pub unlock_percentage:    f64,
  pub threshold_met:        bool,
  pub evaluated_at:         String,
}

impl RawUnlock {
  pub const COLUMNS: &'static str = "unlock_id, student_id, module_id, is_unlocked,
    unlocked_date, stars_earned, total_possible_stars, unlock_percentage,
    threshold_met, evaluated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      unlock_id:            row.get(0)?,
      student_id:           row.get(1)?,
      module_id:            row.get(2)?,
      is_unlocked:          row.get(3)?,
      unlocked_date:        row.get(4)?,
      stars_earned:         row.get(5)?,
      total_possible_stars: row.get(6)?,
      unlock_percentage:    row.get(7)?,
      threshold_met:        row.get(8)?,
      evaluated_at:         row.get(9)?,
    })
  }

  pub fn into_unlock(self) -> Result<StudentModuleUnlock> {
    Ok(StudentModuleUnlock {
      unlock_id:            decode_uuid(&self.unlock_id)?,
      student_id:           decode_uuid(&self.student_id)?,
      module_id:            decode_uuid(&self.module_id)?,
      is_unlocked:          self.is_unlocked,
      unlocked_date:        decode_opt_dt(self.unlocked_date)?,
      stars_earned:         self.stars_earned,
      total_possible_stars: self.total_possible_stars,
      unlock_percentage:    self.unlock_percentage,
      threshold_met:        self.threshold_met,
      evaluated_at:         decode_dt(&self.evaluated_at)?,
    })
  }
}

pub struct RawAssessment {
  pub assessment_id:           String,
  pub student_id:              String,
  pub level_id:                String,
  pub instructor_id:           Option<String>,
  pub status:                  String,
  pub criteria_scores:         String,
  pub overall_score:           Option<f64>,
  pub passed:                  bool,
  pub can_continue_next_level: bool,
  pub progression_suspended:   bool,
  pub suspension_reason:       Option<String>,
  pub suspended_from:          Option<String>,
  pub assessed_at:             Option<String>,
  pub version:                 u32,
  pub created_at:              String,
  pub updated_at:              String,
}

impl RawAssessment {
  pub const COLUMNS: &'static str = "a.assessment_id, a.student_id, a.level_id,
    a.instructor_id, a.status, a.criteria_scores, a.overall_score, a.passed,
    a.can_continue_next_level, a.progression_suspended, a.suspension_reason,
    a.suspended_from, a.assessed_at, a.version, a.created_at, a.updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assessment_id:           row.get(0)?,
      student_id:              row.get(1)?,
      level_id:                row.get(2)?,
      instructor_id:           row.get(3)?,
      status:                  row.get(4)?,
      criteria_scores:         row.get(5)?,
      overall_score:           row.get(6)?,
      passed:                  row.get(7)?,
      can_continue_next_level: row.get(8)?,
      progression_suspended:   row.get(9)?,
      suspension_reason:       row.get(10)?,
      suspended_from:          row.get(11)?,
      assessed_at:             row.get(12)?,
      version:                 row.get(13)?,
      created_at:              row.get(14)?,
      updated_at:              row.get(15)?,
    })
  }

  pub fn into_assessment(self) -> Result<StudentLevelAssessment> {
    let criteria_scores: CriteriaScores = serde_json::from_str(&self.criteria_scores)?;
    let suspended_from = self
      .suspended_from
      .as_deref()
      .map(|s| decode_enum::<AssessmentStatus>("assessment status", s))
      .transpose()?;

    Ok(StudentLevelAssessment {
      assessment_id: decode_uuid(&self.assessment_id)?,
      student_id: decode_uuid(&self.student_id)?,
      level_id: decode_uuid(&self.level_id)?,
      instructor_id: decode_opt_uuid(self.instructor_id)?,
      status: decode_enum("assessment status", &self.status)?,
      criteria_scores,
      overall_score: self.overall_score,
      passed: self.passed,
      can_continue_next_level: self.can_continue_next_level,
      progression_suspended: self.progression_suspended,
      suspension_reason: self.suspension_reason,
      suspended_from,
      assessed_at: decode_opt_dt(self.assessed_at)?,
      version: self.version,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAnalytics {
  pub analytics_id: String,
  pub entity_type:  String,
  pub entity_id:    String,
  pub period_type:  String,
  pub period_start: String,
  pub period_end:   String,
  pub metrics_json: String,
  pub generated_at: String,
}

impl RawAnalytics {
  pub const COLUMNS: &'static str = "analytics_id, entity_type, entity_id, period_type,
    period_start, period_end, metrics_json, generated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      analytics_id: row.get(0)?,
      entity_type:  row.get(1)?,
      entity_id:    row.get(2)?,
      period_type:  row.get(3)?,
      period_start: row.get(4)?,
      period_end:   row.get(5)?,
      metrics_json: row.get(6)?,
      generated_at: row.get(7)?,
    })
  }

  pub fn into_analytics(self) -> Result<ProgressionAnalytics> {
    Ok(ProgressionAnalytics {
      analytics_id: decode_uuid(&self.analytics_id)?,
      entity_type:  decode_enum::<EntityType>("entity type", &self.entity_type)?,
      entity_id:    decode_uuid(&self.entity_id)?,
      period_type:  decode_enum::<PeriodType>("period type", &self.period_type)?,
      period_start: decode_dt(&self.period_start)?,
      period_end:   decode_dt(&self.period_end)?,
      metrics:      serde_json::from_str(&self.metrics_json)?,
      generated_at: decode_dt(&self.generated_at)?,
    })
  }
}
