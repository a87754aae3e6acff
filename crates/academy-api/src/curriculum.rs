//! Handlers for curriculum structure endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/curricula` | Body: `{"name":"..."}` |
//! | `GET`  | `/curricula/{id}` | 404 if not found |
//! | `GET`  | `/curricula/{id}/modules` | Level order, then module order |
//! | `POST` | `/levels` | Body: [`NewLevel`] |
//! | `GET`  | `/levels/{id}` | |
//! | `POST` | `/modules` | Body: [`NewModule`] |
//! | `GET`  | `/modules/{id}` | |
//! | `GET`  | `/modules/{id}/lessons` | Lesson order |
//! | `POST` | `/lessons` | Body: [`NewLesson`]; `max_stars` defaults to 3 |
//! | `GET`  | `/lessons/{id}` | |

use std::sync::Arc;

use academy_core::{
  curriculum::{Curriculum, Lesson, Level, Module, NewLesson, NewLevel, NewModule},
  store::ProgressionStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Curricula ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateCurriculum {
  pub name: String,
}

/// `POST /curricula`
pub async fn create_curriculum<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateCurriculum>,
) -> Result<impl IntoResponse, ApiError> {
  let curriculum = store
    .add_curriculum(body.name)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(curriculum)))
}

/// `GET /curricula/{id}`
pub async fn get_curriculum<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Curriculum>, ApiError> {
  let curriculum = store
    .get_curriculum(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("curriculum {id} not found")))?;
  Ok(Json(curriculum))
}

/// `GET /curricula/{id}/modules`
pub async fn curriculum_modules<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Module>>, ApiError> {
  let modules = store
    .curriculum_modules(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(modules))
}

// ─── Levels ───────────────────────────────────────────────────────────────────

/// `POST /levels`
pub async fn create_level<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewLevel>,
) -> Result<impl IntoResponse, ApiError> {
  let level = store.add_level(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(level)))
}

/// `GET /levels/{id}`
pub async fn get_level<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Level>, ApiError> {
  let level = store
    .get_level(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("level {id} not found")))?;
  Ok(Json(level))
}

// ─── Modules ──────────────────────────────────────────────────────────────────

/// `POST /modules`
pub async fn create_module<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewModule>,
) -> Result<impl IntoResponse, ApiError> {
  let module = store.add_module(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(module)))
}

/// `GET /modules/{id}`
pub async fn get_module<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Module>, ApiError> {
  let module = store
    .get_module(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("module {id} not found")))?;
  Ok(Json(module))
}

/// `GET /modules/{id}/lessons`
pub async fn module_lessons<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
  let lessons = store.module_lessons(id).await.map_err(ApiError::from_store)?;
  Ok(Json(lessons))
}

// ─── Lessons ──────────────────────────────────────────────────────────────────

/// `POST /lessons`
pub async fn create_lesson<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewLesson>,
) -> Result<impl IntoResponse, ApiError> {
  let lesson = store.add_lesson(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(lesson)))
}

/// `GET /lessons/{id}`
pub async fn get_lesson<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Lesson>, ApiError> {
  let lesson = store
    .get_lesson(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("lesson {id} not found")))?;
  Ok(Json(lesson))
}
