//! JSON REST API for academy progression.
//!
//! Exposes an axum [`Router`] backed by any
//! [`academy_core::store::ProgressionStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", academy_api::api_router(store.clone()))
//! ```

pub mod analytics;
pub mod assessments;
pub mod criteria;
pub mod curriculum;
pub mod error;
pub mod etag;
pub mod progress;
pub mod settings;

use std::sync::Arc;

use academy_core::store::ProgressionStore;
use axum::{
  Router,
  routing::{get, post, put},
};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ProgressionStore + 'static,
{
  Router::new()
    // Curriculum structure
    .route("/curricula", post(curriculum::create_curriculum::<S>))
    .route("/curricula/{id}", get(curriculum::get_curriculum::<S>))
    .route("/curricula/{id}/modules", get(curriculum::curriculum_modules::<S>))
    .route("/levels", post(curriculum::create_level::<S>))
    .route("/levels/{id}", get(curriculum::get_level::<S>))
    .route("/modules", post(curriculum::create_module::<S>))
    .route("/modules/{id}", get(curriculum::get_module::<S>))
    .route("/modules/{id}/lessons", get(curriculum::module_lessons::<S>))
    .route("/lessons", post(curriculum::create_lesson::<S>))
    .route("/lessons/{id}", get(curriculum::get_lesson::<S>))
    // Settings
    .route("/settings", put(settings::configure::<S>))
    .route(
      "/curricula/{id}/settings",
      get(settings::get_one::<S>).delete(settings::deactivate::<S>),
    )
    // Criteria
    .route("/criteria", post(criteria::create::<S>))
    .route("/levels/{id}/criteria", get(criteria::list::<S>))
    // Lesson progress and unlocks
    .route("/students/{sid}/lessons/{lid}/progress", get(progress::get_progress::<S>))
    .route("/students/{sid}/lessons/{lid}/attempts", post(progress::record_attempt::<S>))
    .route("/students/{sid}/lessons/{lid}/grade", put(progress::grade::<S>))
    .route(
      "/students/{sid}/modules/{mid}/unlock",
      get(progress::get_unlock::<S>).post(progress::evaluate_unlock::<S>),
    )
    .route("/students/{sid}/unlocks", get(progress::list_unlocks::<S>))
    // Level assessments
    .route("/assessments", post(assessments::open::<S>))
    .route("/assessments/{id}", get(assessments::get_one::<S>))
    .route("/assessments/{id}/scores", post(assessments::submit_scores::<S>))
    .route("/assessments/{id}/finalize", post(assessments::finalize::<S>))
    .route("/assessments/{id}/suspend", post(assessments::suspend::<S>))
    .route("/assessments/{id}/reinstate", post(assessments::reinstate::<S>))
    .route("/assessments/{id}/advance", get(assessments::advance::<S>))
    .route("/students/{sid}/assessments", get(assessments::list::<S>))
    // Analytics
    .route("/analytics", post(analytics::aggregate::<S>))
    .route("/analytics/latest", get(analytics::latest::<S>))
    .with_state(store)
}
