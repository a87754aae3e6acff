//! Handlers for level assessment criteria.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/criteria` | Body: [`NewCriterion`]; weight 1, max 3, min 1 by default |
//! | `GET`  | `/levels/{id}/criteria` | Sequence order |

use std::sync::Arc;

use academy_core::{
  criteria::{LevelAssessmentCriterion, NewCriterion},
  store::ProgressionStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /criteria`
pub async fn create<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewCriterion>,
) -> Result<impl IntoResponse, ApiError> {
  let criterion = store.add_criterion(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(criterion)))
}

/// `GET /levels/{id}/criteria`
pub async fn list<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(level_id): Path<Uuid>,
) -> Result<Json<Vec<LevelAssessmentCriterion>>, ApiError> {
  let criteria = store.list_criteria(level_id).await.map_err(ApiError::from_store)?;
  Ok(Json(criteria))
}
