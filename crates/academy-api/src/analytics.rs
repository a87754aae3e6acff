//! Handlers for progression analytics.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/analytics` | Body: [`AggregateBody`]; persists unless `"persist":false` |
//! | `GET`  | `/analytics/latest` | `?entity_type&entity_id&period_type&period_start`; 404 if none |

use std::sync::Arc;

use academy_core::{
  analytics::{AnalyticsKey, EntityType, Period, PeriodType, ProgressionAnalytics},
  engine::Progression,
  store::ProgressionStore,
};
use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Aggregate ────────────────────────────────────────────────────────────────

/// A reporting window: either the calendar period containing `date`, or an
/// explicit `[start, end)` for `custom`.
#[derive(Debug, Deserialize)]
pub struct AggregateBody {
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub period_type: PeriodType,
  pub date:        Option<NaiveDate>,
  pub start:       Option<DateTime<Utc>>,
  pub end:         Option<DateTime<Utc>>,
  #[serde(default = "yes")]
  pub persist:     bool,
}

fn yes() -> bool { true }

impl AggregateBody {
  fn period(&self) -> Result<Period, ApiError> {
    match (self.period_type, self.date, self.start, self.end) {
      (PeriodType::Custom, _, Some(start), Some(end)) => Ok(Period::custom(start, end)?),
      (PeriodType::Custom, ..) => Err(ApiError::BadRequest(
        "a custom period needs both `start` and `end`".into(),
      )),
      (period_type, Some(date), ..) => Ok(Period::containing(period_type, date)?),
      (period_type, None, ..) => Ok(Period::containing(period_type, Utc::now().date_naive())?),
    }
  }
}

/// `POST /analytics`
pub async fn aggregate<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<AggregateBody>,
) -> Result<Json<ProgressionAnalytics>, ApiError> {
  let period = body.period()?;
  let row = Progression::new(&*store)
    .aggregate(body.entity_type, body.entity_id, period, body.persist)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(row))
}

// ─── Latest ───────────────────────────────────────────────────────────────────

/// `GET /analytics/latest?entity_type=..&entity_id=..&period_type=..&period_start=..`
pub async fn latest<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Query(key): Query<AnalyticsKey>,
) -> Result<Json<ProgressionAnalytics>, ApiError> {
  let row = store
    .latest_analytics(key)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no {} snapshot for {} {} starting {}",
        key.period_type, key.entity_type, key.entity_id, key.period_start
      ))
    })?;
  Ok(Json(row))
}
