//! Handlers for a student's lesson progress and module unlocks.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/students/{sid}/lessons/{lid}/progress` | Sets `ETag` |
//! | `POST` | `/students/{sid}/lessons/{lid}/attempts` | Body: `{"minutes_spent":12}` |
//! | `PUT`  | `/students/{sid}/lessons/{lid}/grade` | Body: [`GradeBody`]; honours `If-Match` |
//! | `GET`  | `/students/{sid}/modules/{mid}/unlock` | Last stored evaluation |
//! | `POST` | `/students/{sid}/modules/{mid}/unlock` | Re-evaluate now |
//! | `GET`  | `/students/{sid}/unlocks` | All stored evaluations |

use std::sync::Arc;

use academy_core::{
  engine::Progression,
  progress::{GradeLesson, StudentLessonProgress},
  store::ProgressionStore,
  unlock::StudentModuleUnlock,
};
use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, header},
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, etag};

// ─── Lesson progress ──────────────────────────────────────────────────────────

/// `GET /students/{sid}/lessons/{lid}/progress`
pub async fn get_progress<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path((student_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
  let progress = store
    .get_lesson_progress(student_id, lesson_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no progress for student {student_id} on lesson {lesson_id}"))
    })?;
  Ok(with_etag(progress))
}

#[derive(Debug, Deserialize)]
pub struct AttemptBody {
  #[serde(default)]
  pub minutes_spent: u32,
}

/// `POST /students/{sid}/lessons/{lid}/attempts`
pub async fn record_attempt<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path((student_id, lesson_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<AttemptBody>,
) -> Result<impl IntoResponse, ApiError> {
  let progress = Progression::new(&*store)
    .record_attempt(student_id, lesson_id, body.minutes_spent)
    .await
    .map_err(ApiError::from_store)?;
  Ok(with_etag(progress))
}

#[derive(Debug, Deserialize)]
pub struct GradeBody {
  pub stars:         u8,
  pub instructor_id: Uuid,
}

/// `PUT /students/{sid}/lessons/{lid}/grade`
///
/// With `If-Match`, the grade applies only to the progress row the client
/// last saw. A missing row never matches. The response carries the grade,
/// the re-evaluated unlock of the following module, and the new `ETag`.
pub async fn grade<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path((student_id, lesson_id)): Path<(Uuid, Uuid)>,
  headers: HeaderMap,
  Json(body): Json<GradeBody>,
) -> Result<impl IntoResponse, ApiError> {
  let expected_version = match etag::if_match(&headers) {
    None => None,
    Some(if_match) => {
      let current = store
        .get_lesson_progress(student_id, lesson_id)
        .await
        .map_err(ApiError::from_store)?
        .ok_or(ApiError::PreconditionFailed)?;
      if !etag::matches(if_match, &etag::progress_etag(&current)) {
        return Err(ApiError::PreconditionFailed);
      }
      Some(current.version)
    }
  };

  let outcome = Progression::new(&*store)
    .grade_lesson(GradeLesson {
      student_id,
      lesson_id,
      stars: body.stars,
      instructor_id: body.instructor_id,
      expected_version,
    })
    .await
    .map_err(ApiError::from_store)?;

  let tag = etag::progress_etag(&outcome.progress);
  Ok(([(header::ETAG, tag)], Json(outcome)))
}

fn with_etag(progress: StudentLessonProgress) -> impl IntoResponse {
  let tag = etag::progress_etag(&progress);
  ([(header::ETAG, tag)], Json(progress))
}

// ─── Module unlocks ───────────────────────────────────────────────────────────

/// `GET /students/{sid}/modules/{mid}/unlock`
pub async fn get_unlock<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path((student_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StudentModuleUnlock>, ApiError> {
  let unlock = store
    .get_module_unlock(student_id, module_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("module {module_id} not evaluated for student {student_id}"))
    })?;
  Ok(Json(unlock))
}

/// `POST /students/{sid}/modules/{mid}/unlock`
pub async fn evaluate_unlock<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path((student_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StudentModuleUnlock>, ApiError> {
  let unlock = Progression::new(&*store)
    .evaluate_unlock(student_id, module_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(unlock))
}

/// `GET /students/{sid}/unlocks`
pub async fn list_unlocks<S: ProgressionStore>(
  State(store): State<Arc<S>>,
  Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<StudentModuleUnlock>>, ApiError> {
  let unlocks = store.list_unlocks(student_id).await.map_err(ApiError::from_store)?;
  Ok(Json(unlocks))
}
