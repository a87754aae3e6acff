//! Handlers for progression settings.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `PUT`    | `/settings` | Body: [`NewSettings`]; creates or updates the active row |
//! | `GET`    | `/curricula/{id}/settings` | 404 if none is active |
//! | `DELETE` | `/curricula/{id}/settings` | Soft delete; returns the deactivated row |

use std::sync::Arc;

use academy_core::{
  settings::{NewSettings, ProgressionSettings},
  store::ProgressionStore,
};
use axum::{
  Json,
  extract::{Path, State},
};
use uuid::Uuid;

use crate::error::ApiError;

/// `PUT /settings`
pub async fn configure<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSettings>,
) -> Result<Json<ProgressionSettings>, ApiError> {
  let settings = store
    .configure_settings(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(settings))
}

/// `GET /curricula/{id}/settings`
pub async fn get_one<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(curriculum_id): Path<Uuid>,
) -> Result<Json<ProgressionSettings>, ApiError> {
  let settings = store
    .get_settings(curriculum_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(academy_core::Error::SettingsNotConfigured(curriculum_id))
    .map_err(|e| ApiError::NotFound(e.to_string()))?;
  Ok(Json(settings))
}

/// `DELETE /curricula/{id}/settings`
pub async fn deactivate<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(curriculum_id): Path<Uuid>,
) -> Result<Json<ProgressionSettings>, ApiError> {
  let settings = store
    .deactivate_settings(curriculum_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no active settings for curriculum {curriculum_id}"))
    })?;
  Ok(Json(settings))
}
