//! Progression gatekeeper: may a student move past a level?
//!
//! Progression is about *starting* new content. A pending assessment does not
//! hold a student back when the curriculum allows cross-level progression;
//! only a suspension, a failure, or a disabled cross-level policy does.

use crate::{
  assessment::{AssessmentStatus, StudentLevelAssessment},
  settings::ProgressionSettings,
};

/// Whether the assessed student may advance past the assessment's level.
pub fn can_advance(assessment: &StudentLevelAssessment, settings: &ProgressionSettings) -> bool {
  if assessment.progression_suspended {
    return false;
  }
  match assessment.status {
    AssessmentStatus::Passed => true,
    AssessmentStatus::Pending => settings.allow_cross_level_progression,
    AssessmentStatus::Completed | AssessmentStatus::Suspended | AssessmentStatus::Failed => false,
  }
}
