use serde::{Deserialize, Serialize};

/// Ordered wizard steps.
///
/// The order of `ALL` is the order the wizard presents them in; progress is
/// measured as completed steps over `ALL.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    PersonalInfo,
    Contact,
    Profile,
    Agreements,
    Review,
}

impl Default for WizardStep {
    fn default() -> Self {
        WizardStep::PersonalInfo
    }
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::PersonalInfo,
        WizardStep::Contact,
        WizardStep::Profile,
        WizardStep::Agreements,
        WizardStep::Review,
    ];

    /// Fields that must be present and non-empty before this step may be
    /// marked complete.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            WizardStep::PersonalInfo => &["first_name", "last_name", "birth_date"],
            WizardStep::Contact => &["email", "phone", "city", "state"],
            WizardStep::Profile => &["bio"],
            WizardStep::Agreements => &["accepted_terms"],
            WizardStep::Review => &[],
        }
    }

    /// The step following this one in wizard order, or None on the last step.
    pub fn next(&self) -> Option<WizardStep> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }
}
