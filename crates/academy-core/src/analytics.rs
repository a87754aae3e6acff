//! Progression analytics: derived, append-only reporting snapshots.
//!
//! Nothing here feeds back into unlock or gating decisions. The aggregator is
//! a pure summary over progress and assessment rows that the store has
//! already filtered down to one entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  assessment::{AssessmentStatus, StudentLevelAssessment},
  curriculum::DEFAULT_MAX_STARS,
  progress::StudentLessonProgress,
  settings::ProgressionSettings,
};

// ─── Keys ────────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityType {
  Student,
  Instructor,
  Curriculum,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PeriodType {
  Daily,
  Weekly,
  Monthly,
  Custom,
}

/// A half-open reporting window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
  pub period_type: PeriodType,
  pub start:       DateTime<Utc>,
  pub end:         DateTime<Utc>,
}

impl Period {
  /// The calendar day, ISO week (Monday first), or month containing `date`.
  pub fn containing(period_type: PeriodType, date: NaiveDate) -> Result<Self> {
    let (first, last) = match period_type {
      PeriodType::Daily => (date, date + Duration::days(1)),
      PeriodType::Weekly => {
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        (monday, monday + Duration::days(7))
      }
      PeriodType::Monthly => {
        let first = date - Duration::days(i64::from(date.day0()));
        let next = first
          .checked_add_months(Months::new(1))
          .ok_or_else(|| Error::Validation(format!("month after {first} is out of range")))?;
        (first, next)
      }
      PeriodType::Custom => {
        return Err(Error::Validation(
          "custom periods need an explicit start and end".into(),
        ));
      }
    };
    Ok(Self {
      period_type,
      start: first.and_time(NaiveTime::MIN).and_utc(),
      end: last.and_time(NaiveTime::MIN).and_utc(),
    })
  }

  pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
    if start >= end {
      return Err(Error::Validation(format!(
        "period start {start} must be before end {end}"
      )));
    }
    Ok(Self { period_type: PeriodType::Custom, start, end })
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool { self.start <= at && at < self.end }
}

/// Identity of an analytics snapshot series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsKey {
  pub entity_type:  EntityType,
  pub entity_id:    Uuid,
  pub period_type:  PeriodType,
  pub period_start: DateTime<Utc>,
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// Which optional metrics to compute; mirrors the curriculum toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsOptions {
  pub track_time_spent:        bool,
  pub track_star_distribution: bool,
}

impl Default for AnalyticsOptions {
  fn default() -> Self {
    Self { track_time_spent: true, track_star_distribution: true }
  }
}

impl From<&ProgressionSettings> for AnalyticsOptions {
  fn from(s: &ProgressionSettings) -> Self {
    Self {
      track_time_spent:        s.track_time_spent,
      track_star_distribution: s.track_star_distribution,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressionMetrics {
  pub lessons_tracked:          u32,
  /// Lessons whose grade falls in the period.
  pub lessons_completed:        u32,
  /// `lessons_completed / lessons_tracked`, or `0.0` with nothing tracked.
  pub completion_rate:          f64,
  pub graded_lessons:           u32,
  pub average_stars:            Option<f64>,
  /// Graded lessons per star value, `0..=3`.
  pub star_distribution:        Option<BTreeMap<u8, u32>>,
  pub total_attempts:           u64,
  pub total_time_spent_minutes: Option<u64>,
  pub assessments_total:        u32,
  pub assessments_pending:      u32,
  pub assessments_passed:       u32,
  pub assessments_failed:       u32,
  pub assessments_suspended:    u32,
  /// `passed / (passed + failed)`; `None` until an assessment closes.
  pub pass_rate:                Option<f64>,
  pub average_assessment_score: Option<f64>,
}

/// A persisted snapshot. Rows are only ever appended; the newest row for a
/// key is the current figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionAnalytics {
  pub analytics_id: Uuid,
  pub entity_type:  EntityType,
  pub entity_id:    Uuid,
  pub period_type:  PeriodType,
  pub period_start: DateTime<Utc>,
  pub period_end:   DateTime<Utc>,
  pub metrics:      ProgressionMetrics,
  pub generated_at: DateTime<Utc>,
}

impl ProgressionAnalytics {
  pub fn key(&self) -> AnalyticsKey {
    AnalyticsKey {
      entity_type:  self.entity_type,
      entity_id:    self.entity_id,
      period_type:  self.period_type,
      period_start: self.period_start,
    }
  }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Summarise progress and assessment rows against `period`.
///
/// A progress row is tracked in every period that saw its last activity
/// (`updated_at`) or its grade (`graded_date`). Completion, stars and the
/// histogram follow `graded_date`, so a lesson graded in March and retaken
/// in April still reports its March grade in March. Attempts and minutes are
/// the row's running totals and are reported with each period that tracks
/// it. Assessments are placed by `updated_at`.
pub fn aggregate(
  progress: &[StudentLessonProgress],
  assessments: &[StudentLevelAssessment],
  period: &Period,
  options: AnalyticsOptions,
) -> ProgressionMetrics {
  let mut m = ProgressionMetrics::default();
  let mut star_total = 0u64;
  let mut histogram: BTreeMap<u8, u32> = (0..=DEFAULT_MAX_STARS).map(|s| (s, 0)).collect();
  let mut minutes = 0u64;

  for p in progress {
    let graded_in_period = p.graded_date.is_some_and(|at| period.contains(at));
    if !graded_in_period && !period.contains(p.updated_at) {
      continue;
    }

    m.lessons_tracked += 1;
    m.total_attempts += u64::from(p.attempt_count);
    minutes += u64::from(p.total_time_spent_minutes);

    if let (true, Some(stars)) = (graded_in_period, p.stars_earned) {
      m.lessons_completed += 1;
      m.graded_lessons += 1;
      star_total += u64::from(stars);
      *histogram.entry(stars).or_insert(0) += 1;
    }
  }

  if m.lessons_tracked > 0 {
    m.completion_rate = f64::from(m.lessons_completed) / f64::from(m.lessons_tracked);
  }
  if m.graded_lessons > 0 {
    m.average_stars = Some(star_total as f64 / f64::from(m.graded_lessons));
  }
  if options.track_star_distribution {
    m.star_distribution = Some(histogram);
  }
  if options.track_time_spent {
    m.total_time_spent_minutes = Some(minutes);
  }

  let mut score_sum = 0.0;
  let mut scored = 0u32;
  for a in assessments.iter().filter(|a| period.contains(a.updated_at)) {
    m.assessments_total += 1;
    match a.status {
      AssessmentStatus::Pending | AssessmentStatus::Completed => m.assessments_pending += 1,
      AssessmentStatus::Passed => m.assessments_passed += 1,
      AssessmentStatus::Failed => m.assessments_failed += 1,
      AssessmentStatus::Suspended => m.assessments_suspended += 1,
    }
    if let Some(score) = a.overall_score {
      score_sum += score;
      scored += 1;
    }
  }

  let decided = m.assessments_passed + m.assessments_failed;
  if decided > 0 {
    m.pass_rate = Some(f64::from(m.assessments_passed) / f64::from(decided));
  }
  if scored > 0 {
    m.average_assessment_score = Some(score_sum / f64::from(scored));
  }

  m
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, 12, 0, 0).unwrap()
  }

  fn progress(stars: Option<u8>, completed: bool, when: DateTime<Utc>) -> StudentLessonProgress {
    let mut p = StudentLessonProgress::new(Uuid::new_v4(), Uuid::new_v4(), when);
    p.stars_earned = stars;
    p.is_completed = completed;
    p.graded_date = stars.map(|_| when);
    p.attempt_count = 2;
    p.total_time_spent_minutes = 30;
    p
  }

  fn assessment(status: AssessmentStatus, score: Option<f64>, when: DateTime<Utc>) -> StudentLevelAssessment {
    let settings = ProgressionSettings::new(Uuid::nil(), 60.0);
    let mut a = StudentLevelAssessment::open(Uuid::new_v4(), Uuid::new_v4(), None, &settings, when);
    a.status = status;
    a.overall_score = score;
    a
  }

  fn march() -> Period {
    Period::containing(PeriodType::Monthly, NaiveDate::from_ymd_opt(2026, 3, 17).unwrap()).unwrap()
  }

  #[test]
  fn weekly_period_starts_on_monday() {
    // 2026-03-19 is a Thursday.
    let p = Period::containing(PeriodType::Weekly, NaiveDate::from_ymd_opt(2026, 3, 19).unwrap())
      .unwrap();
    assert_eq!(p.start.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
    assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 23).unwrap());
  }

  #[test]
  fn monthly_period_rolls_over_the_year() {
    let p = Period::containing(PeriodType::Monthly, NaiveDate::from_ymd_opt(2026, 12, 5).unwrap())
      .unwrap();
    assert_eq!(p.start.date_naive(), NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
    assert_eq!(p.end.date_naive(), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
  }

  #[test]
  fn custom_period_needs_explicit_bounds() {
    let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    assert!(Period::containing(PeriodType::Custom, day).is_err());
    assert!(Period::custom(at(2026, 3, 2), at(2026, 3, 1)).is_err());
    assert!(Period::custom(at(2026, 3, 1), at(2026, 3, 2)).is_ok());
  }

  #[test]
  fn empty_input_yields_zeroed_metrics() {
    let m = aggregate(&[], &[], &march(), AnalyticsOptions::default());
    assert_eq!(m.lessons_tracked, 0);
    assert_eq!(m.completion_rate, 0.0);
    assert!(m.average_stars.is_none());
    assert!(m.pass_rate.is_none());
    assert_eq!(m.total_time_spent_minutes, Some(0));
  }

  #[test]
  fn lesson_metrics_only_count_rows_in_period() {
    let rows = vec![
      progress(Some(3), true, at(2026, 3, 2)),
      progress(Some(1), true, at(2026, 3, 20)),
      progress(None, false, at(2026, 3, 21)),
      progress(Some(2), true, at(2026, 4, 1)),
    ];
    let m = aggregate(&rows, &[], &march(), AnalyticsOptions::default());

    assert_eq!(m.lessons_tracked, 3);
    assert_eq!(m.lessons_completed, 2);
    assert_eq!(m.graded_lessons, 2);
    assert_eq!(m.average_stars, Some(2.0));
    assert_eq!(m.total_attempts, 6);
    assert_eq!(m.total_time_spent_minutes, Some(90));

    let hist = m.star_distribution.unwrap();
    assert_eq!(hist[&0], 0);
    assert_eq!(hist[&1], 1);
    assert_eq!(hist[&2], 0);
    assert_eq!(hist[&3], 1);
  }

  #[test]
  fn retake_keeps_the_grade_in_its_own_period() {
    let mut row = progress(Some(3), true, at(2026, 3, 10));
    row.is_completed = false;
    row.updated_at = at(2026, 4, 5);

    let m = aggregate(std::slice::from_ref(&row), &[], &march(), AnalyticsOptions::default());
    assert_eq!(m.lessons_tracked, 1);
    assert_eq!(m.lessons_completed, 1);
    assert_eq!(m.graded_lessons, 1);
    assert_eq!(m.average_stars, Some(3.0));

    let april =
      Period::containing(PeriodType::Monthly, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()).unwrap();
    let m = aggregate(&[row], &[], &april, AnalyticsOptions::default());
    assert_eq!(m.lessons_tracked, 1);
    assert_eq!(m.lessons_completed, 0);
    assert_eq!(m.graded_lessons, 0);
    assert!(m.average_stars.is_none());
    assert_eq!(m.total_attempts, 2);
  }

  #[test]
  fn toggles_omit_optional_metrics() {
    let rows = vec![progress(Some(3), true, at(2026, 3, 2))];
    let options = AnalyticsOptions { track_time_spent: false, track_star_distribution: false };
    let m = aggregate(&rows, &[], &march(), options);
    assert!(m.star_distribution.is_none());
    assert!(m.total_time_spent_minutes.is_none());
    assert_eq!(m.graded_lessons, 1);
  }

  #[test]
  fn assessment_outcomes_are_tallied() {
    let rows = vec![
      assessment(AssessmentStatus::Passed, Some(90.0), at(2026, 3, 3)),
      assessment(AssessmentStatus::Passed, Some(70.0), at(2026, 3, 4)),
      assessment(AssessmentStatus::Failed, Some(20.0), at(2026, 3, 5)),
      assessment(AssessmentStatus::Suspended, None, at(2026, 3, 6)),
      assessment(AssessmentStatus::Pending, None, at(2026, 3, 7)),
      assessment(AssessmentStatus::Failed, Some(10.0), at(2026, 2, 7)),
    ];
    let m = aggregate(&[], &rows, &march(), AnalyticsOptions::default());

    assert_eq!(m.assessments_total, 5);
    assert_eq!(m.assessments_passed, 2);
    assert_eq!(m.assessments_failed, 1);
    assert_eq!(m.assessments_suspended, 1);
    assert_eq!(m.assessments_pending, 1);
    assert_eq!(m.average_assessment_score, Some(60.0));
    let rate = m.pass_rate.unwrap();
    assert!((rate - 2.0 / 3.0).abs() < 1e-12);
  }

  #[test]
  fn settings_toggles_become_options() {
    let mut s = ProgressionSettings::new(Uuid::nil(), 60.0);
    s.track_time_spent = false;
    let o = AnalyticsOptions::from(&s);
    assert!(!o.track_time_spent);
    assert!(o.track_star_distribution);
  }
}
