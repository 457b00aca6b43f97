use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::step::WizardStep;

/// Arbitrary scalar or array value accumulated in `step_data`.
pub type FieldValue = serde_json::Value;

/// The persisted onboarding progress record for one user.
///
/// One record exists per user identity; the same shape is stored locally
/// (crash/reload recovery) and remotely (device-loss recovery, resume on
/// another device).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub user_id: String,
    pub email: String,
    pub current_step: WizardStep,
    #[serde(default)]
    pub completed_steps: Vec<WizardStep>,
    #[serde(default)]
    pub step_data: BTreeMap<String, FieldValue>,
    /// Epoch milliseconds of the most recent successful save or
    /// reconciliation decision. Monotonically non-decreasing.
    pub last_updated: i64,
    #[serde(default)]
    pub invitation_based: bool,
    #[serde(default)]
    pub invitation_token: Option<String>,
}

impl OnboardingProgress {
    /// Create a fresh record for a user who has no local or remote progress.
    pub fn new(user_id: String, email: String, initial_step: WizardStep, now_ms: i64) -> Self {
        Self {
            user_id,
            email,
            current_step: initial_step,
            completed_steps: Vec::new(),
            step_data: BTreeMap::new(),
            last_updated: now_ms,
            invitation_based: false,
            invitation_token: None,
        }
    }

    /// Append a step to `completed_steps` if not already present.
    ///
    /// Returns true if the step was newly added.
    pub fn mark_completed(&mut self, step: WizardStep) -> bool {
        if self.completed_steps.contains(&step) {
            return false;
        }
        self.completed_steps.push(step);
        true
    }

    pub fn is_step_completed(&self, step: WizardStep) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Completed steps over total steps, in [0.0, 1.0].
    pub fn progress_fraction(&self) -> f64 {
        self.completed_steps.len() as f64 / WizardStep::ALL.len() as f64
    }
}
