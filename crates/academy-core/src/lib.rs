//! Core types, pure decision rules, and the store trait for the academy
//! curriculum progression engine.
//!
//! This crate has no HTTP or database dependencies. The
//! decision rules (unlock evaluation, assessment scoring, progression gating,
//! analytics aggregation) are plain functions over values; [`engine`] wires
//! them to any [`store::ProgressionStore`] backend.

pub mod analytics;
pub mod assessment;
pub mod criteria;
pub mod curriculum;
pub mod engine;
pub mod error;
pub mod gate;
pub mod progress;
pub mod scoring;
pub mod settings;
pub mod store;
pub mod unlock;

pub use error::{Error, Result};
