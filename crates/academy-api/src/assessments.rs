//! Handlers for level assessment endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/assessments` | Body: [`OpenBody`]; 409 if a cycle is already open |
//! | `GET`  | `/assessments/{id}` | |
//! | `GET`  | `/students/{sid}/assessments` | Optional `?level_id=`; newest first |
//! | `POST` | `/assessments/{id}/scores` | Body: [`ScoresBody`] |
//! | `POST` | `/assessments/{id}/finalize` | `completed` → `passed`/`failed` |
//! | `POST` | `/assessments/{id}/suspend` | Body: `{"reason":"..."}` (optional) |
//! | `POST` | `/assessments/{id}/reinstate` | `suspended` → `pending` |
//! | `GET`  | `/assessments/{id}/advance` | Gatekeeper answer under current settings |

use std::sync::Arc;

use academy_core::{
  assessment::{CriteriaScores, StudentLevelAssessment},
  engine::{Progression, Submission},
  store::ProgressionStore,
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Open ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenBody {
  pub student_id:    Uuid,
  pub level_id:      Uuid,
  pub instructor_id: Option<Uuid>,
}

/// `POST /assessments`
pub async fn open<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<OpenBody>,
) -> Result<impl IntoResponse, ApiError> {
  let assessment = Progression::new(&*store)
    .open_assessment(body.student_id, body.level_id, body.instructor_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(assessment)))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /assessments/{id}`
pub async fn get_one<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<StudentLevelAssessment>, ApiError> {
  let assessment = store
    .get_assessment(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("assessment {id} not found")))?;
  Ok(Json(assessment))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub level_id: Option<Uuid>,
}

/// `GET /students/{sid}/assessments[?level_id=<id>]`
pub async fn list<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(student_id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<StudentLevelAssessment>>, ApiError> {
  let assessments = store
    .list_assessments(student_id, params.level_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assessments))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScoresBody {
  pub instructor_id: Uuid,
  /// Criterion id → score. Criteria left out score zero.
  pub scores:        CriteriaScores,
  /// Close the cycle as `passed`/`failed` in the same request.
  #[serde(default)]
  pub finalize:      bool,
}

/// `POST /assessments/{id}/scores`
pub async fn submit_scores<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ScoresBody>,
) -> Result<Json<Submission>, ApiError> {
  let submission = Progression::new(&*store)
    .submit_scores(id, body.scores, body.instructor_id, body.finalize)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(submission))
}

/// `POST /assessments/{id}/finalize`
pub async fn finalize<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<StudentLevelAssessment>, ApiError> {
  let assessment = Progression::new(&*store)
    .finalize_assessment(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assessment))
}

#[derive(Debug, Deserialize)]
pub struct SuspendBody {
  pub reason: Option<String>,
}

/// `POST /assessments/{id}/suspend`
pub async fn suspend<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  body: Option<Json<SuspendBody>>,
) -> Result<Json<StudentLevelAssessment>, ApiError> {
  let reason = body.and_then(|Json(b)| b.reason);
  let assessment = Progression::new(&*store)
    .suspend_assessment(id, reason)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assessment))
}

/// `POST /assessments/{id}/reinstate`
pub async fn reinstate<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<StudentLevelAssessment>, ApiError> {
  let assessment = Progression::new(&*store)
    .reinstate_assessment(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(assessment))
}

// ─── Gate ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
  pub assessment_id: Uuid,
  pub can_advance:   bool,
}

/// `GET /assessments/{id}/advance`
pub async fn advance<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, ApiError> {
  let can_advance = Progression::new(&*store)
    .can_advance(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(AdvanceResponse { assessment_id: id, can_advance }))
}
