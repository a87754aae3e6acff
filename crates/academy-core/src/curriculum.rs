//! Curriculum structure, as far as the progression engine reads it.
//!
//! A curriculum is a sequence of levels; each level holds a sequence of
//! modules, and each module a sequence of lessons. Only the parts the engine
//! needs are modelled here: identity, parentage, sequence order, and each
//! lesson's star ceiling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Highest star grade an instructor can award for a lesson.
pub const DEFAULT_MAX_STARS: u8 = 3;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curriculum {
  pub curriculum_id: Uuid,
  pub name:          String,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
  pub level_id:       Uuid,
  pub curriculum_id:  Uuid,
  pub name:           String,
  pub sequence_order: i32,
  pub created_at:     DateTime<Utc>,
}

/// A module within a level. `curriculum_id` is denormalised from the parent
/// level so the engine can find the curriculum settings in one read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
  pub module_id:      Uuid,
  pub level_id:       Uuid,
  pub curriculum_id:  Uuid,
  pub name:           String,
  pub sequence_order: i32,
  pub created_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
  pub lesson_id:      Uuid,
  pub module_id:      Uuid,
  pub name:           String,
  pub sequence_order: i32,
  /// Star ceiling for this lesson; contributes to a module's possible total.
  pub max_stars:      u8,
  pub created_at:     DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewLevel {
  pub curriculum_id:  Uuid,
  pub name:           String,
  pub sequence_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewModule {
  pub level_id:       Uuid,
  pub name:           String,
  pub sequence_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLesson {
  pub module_id:      Uuid,
  pub name:           String,
  pub sequence_order: i32,
  #[serde(default = "default_max_stars")]
  pub max_stars:      u8,
}

fn default_max_stars() -> u8 { DEFAULT_MAX_STARS }

impl NewLesson {
  pub fn new(module_id: Uuid, name: impl Into<String>, sequence_order: i32) -> Self {
    Self {
      module_id,
      name: name.into(),
      sequence_order,
      max_stars: DEFAULT_MAX_STARS,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if !(1..=DEFAULT_MAX_STARS).contains(&self.max_stars) {
      return Err(Error::Validation(format!(
        "max_stars must be between 1 and {DEFAULT_MAX_STARS}, got {}",
        self.max_stars
      )));
    }
    Ok(())
  }
}

// ─── Ordering ────────────────────────────────────────────────────────────────

/// Where a module sits in its curriculum's sequence.
#[derive(Debug, Clone, Copy)]
pub enum ModulePosition<'a> {
  /// The opening module; it has no predecessor and is always unlocked.
  First,
  /// Any later module, with the module directly before it.
  After(&'a Module),
}

/// Locate `module_id` within `ordered`, which must be in curriculum order
/// (level sequence, then module sequence). Returns `None` if absent.
pub fn position_of(ordered: &[Module], module_id: Uuid) -> Option<ModulePosition<'_>> {
  let idx = ordered.iter().position(|m| m.module_id == module_id)?;
  Some(match idx {
    0 => ModulePosition::First,
    n => ModulePosition::After(&ordered[n - 1]),
  })
}

/// The module directly after `module_id` in curriculum order, if any.
pub fn next_module(ordered: &[Module], module_id: Uuid) -> Option<&Module> {
  let idx = ordered.iter().position(|m| m.module_id == module_id)?;
  ordered.get(idx + 1)
}
